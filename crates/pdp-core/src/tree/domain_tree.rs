//! Suffix tree keyed by domain names.
//!
//! Labels are walked from the top level domain down; a lookup returns the
//! value of the longest stored suffix on a label boundary.

use std::collections::BTreeMap;

use crate::domain::DomainName;

#[derive(Debug, Clone)]
struct Node<V> {
    value: Option<V>,
    children: BTreeMap<String, Node<V>>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

/// Suffix tree mapping domains to values.
#[derive(Debug, Clone)]
pub struct DomainTree<V> {
    root: Box<Node<V>>,
    len: usize,
}

impl<V> Default for DomainTree<V> {
    fn default() -> Self {
        Self {
            root: Box::default(),
            len: 0,
        }
    }
}

impl<V> DomainTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, domain: &DomainName, value: V) -> Option<V> {
        let mut node: &mut Node<V> = &mut self.root;
        for label in domain.labels_rev() {
            node = node.children.entry(label.to_string()).or_default();
        }

        let old = node.value.replace(value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    pub fn get_exact(&self, domain: &DomainName) -> Option<&V> {
        let mut node: &Node<V> = &self.root;
        for label in domain.labels_rev() {
            node = node.children.get(label)?;
        }
        node.value.as_ref()
    }

    /// Value of the most specific stored domain `domain` belongs to.
    pub fn get(&self, domain: &DomainName) -> Option<&V> {
        let mut node: &Node<V> = &self.root;
        let mut best = None;
        for label in domain.labels_rev() {
            match node.children.get(label) {
                Some(next) => {
                    node = next;
                    if node.value.is_some() {
                        best = node.value.as_ref();
                    }
                }
                None => break,
            }
        }
        best
    }

    pub fn get_exact_mut(&mut self, domain: &DomainName) -> Option<&mut V> {
        let mut node: &mut Node<V> = &mut self.root;
        for label in domain.labels_rev() {
            node = node.children.get_mut(label)?;
        }
        node.value.as_mut()
    }

    pub fn remove(&mut self, domain: &DomainName) -> Option<V> {
        let labels: Vec<&str> = domain.labels_rev().collect();
        let removed = remove_at(&mut self.root, &labels);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Entries in suffix-tree order: a domain before its subdomains,
    /// sibling labels in lexicographic order.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut stack = Vec::new();
        for (label, child) in self.root.children.iter().rev() {
            stack.push((child, vec![label.as_str()]));
        }
        Iter { stack }
    }
}

fn remove_at<V>(node: &mut Node<V>, labels: &[&str]) -> Option<V> {
    let Some((first, rest)) = labels.split_first() else {
        return node.value.take();
    };

    let child = node.children.get_mut(*first)?;
    let removed = remove_at(child, rest);
    if child.value.is_none() && child.children.is_empty() {
        node.children.remove(*first);
    }
    removed
}

pub struct Iter<'a, V> {
    stack: Vec<(&'a Node<V>, Vec<&'a str>)>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (DomainName, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, labels)) = self.stack.pop() {
            for (label, child) in node.children.iter().rev() {
                let mut next = labels.clone();
                next.push(label.as_str());
                self.stack.push((child, next));
            }

            if let Some(v) = node.value.as_ref() {
                if let Some(name) = DomainName::from_labels_rev(&labels) {
                    return Some((name, v));
                }
            }
        }
        None
    }
}

impl<V> FromIterator<(DomainName, V)> for DomainTree<V> {
    fn from_iter<I: IntoIterator<Item = (DomainName, V)>>(iter: I) -> Self {
        let mut tree = DomainTree::new();
        for (d, v) in iter {
            tree.insert(&d, v);
        }
        tree
    }
}
