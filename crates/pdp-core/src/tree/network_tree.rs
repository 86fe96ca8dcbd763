//! Binary prefix tree keyed by IP networks.
//!
//! Lookups by address or network return the value of the most specific
//! network covering the key. IPv4 and IPv6 live in separate roots.

use std::net::IpAddr;

use crate::network::{addr_bits, bit_at, family_width, Network};

#[derive(Debug, Clone)]
struct Node<V> {
    value: Option<V>,
    children: [Option<Box<Node<V>>>; 2],
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: [None, None],
        }
    }
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.iter().all(Option::is_none)
    }
}

/// Prefix tree mapping networks to values.
#[derive(Debug, Clone)]
pub struct NetworkTree<V> {
    v4: Box<Node<V>>,
    v6: Box<Node<V>>,
    len: usize,
}

impl<V> Default for NetworkTree<V> {
    fn default() -> Self {
        Self {
            v4: Box::default(),
            v6: Box::default(),
            len: 0,
        }
    }
}

impl<V> NetworkTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn root(&self, v4: bool) -> &Node<V> {
        if v4 {
            &self.v4
        } else {
            &self.v6
        }
    }

    fn root_mut(&mut self, v4: bool) -> &mut Node<V> {
        if v4 {
            &mut self.v4
        } else {
            &mut self.v6
        }
    }

    /// Inserts or replaces the value stored at `net`. Returns the old value.
    pub fn insert(&mut self, net: Network, value: V) -> Option<V> {
        let (bits, prefix) = net.bits();
        let mut node = self.root_mut(net.is_ipv4());

        for i in 0..prefix {
            node = &mut **node.children[bit_at(bits, i)].get_or_insert_with(Box::default);
        }

        let old = node.value.replace(value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Value stored exactly at `net`.
    pub fn get_exact(&self, net: &Network) -> Option<&V> {
        let (bits, prefix) = net.bits();
        let mut node = self.root(net.is_ipv4());
        for i in 0..prefix {
            node = node.children[bit_at(bits, i)].as_deref()?;
        }
        node.value.as_ref()
    }

    /// Value of the most specific network containing `addr`.
    pub fn get_by_addr(&self, addr: &IpAddr) -> Option<&V> {
        self.longest(addr_bits(addr), family_width(addr), addr.is_ipv4())
    }

    /// Value of the most specific network covering `net`.
    pub fn get_by_net(&self, net: &Network) -> Option<&V> {
        let (bits, prefix) = net.bits();
        self.longest(bits, prefix, net.is_ipv4())
    }

    fn longest(&self, bits: u128, depth: u8, v4: bool) -> Option<&V> {
        let mut node = self.root(v4);
        let mut best = node.value.as_ref();
        for i in 0..depth {
            match node.children[bit_at(bits, i)].as_deref() {
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

    /// Removes the value stored exactly at `net`, pruning empty branches.
    pub fn remove(&mut self, net: &Network) -> Option<V> {
        let (bits, prefix) = net.bits();
        let removed = remove_at(self.root_mut(net.is_ipv4()), bits, prefix, 0);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Entries in prefix-tree order: IPv4 before IPv6, a network before the
    /// networks it contains, lower half before upper half.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut stack = Vec::new();
        stack.push((&*self.v6, 0u128, 0u8, false));
        stack.push((&*self.v4, 0u128, 0u8, true));
        Iter { stack }
    }

    /// Mutable access to the value stored exactly at `net`.
    pub fn get_exact_mut(&mut self, net: &Network) -> Option<&mut V> {
        let (bits, prefix) = net.bits();
        let mut node = self.root_mut(net.is_ipv4());
        for i in 0..prefix {
            node = node.children[bit_at(bits, i)].as_deref_mut()?;
        }
        node.value.as_mut()
    }
}

fn remove_at<V>(node: &mut Node<V>, bits: u128, prefix: u8, depth: u8) -> Option<V> {
    if depth == prefix {
        return node.value.take();
    }

    let b = bit_at(bits, depth);
    let child = node.children[b].as_deref_mut()?;
    let removed = remove_at(child, bits, prefix, depth + 1);
    if child.is_empty() {
        node.children[b] = None;
    }
    removed
}

pub struct Iter<'a, V> {
    stack: Vec<(&'a Node<V>, u128, u8, bool)>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Network, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, bits, depth, v4)) = self.stack.pop() {
            if let Some(upper) = node.children[1].as_deref() {
                let b = bits | (1u128 << (127 - u32::from(depth)));
                self.stack.push((upper, b, depth + 1, v4));
            }
            if let Some(lower) = node.children[0].as_deref() {
                self.stack.push((lower, bits, depth + 1, v4));
            }
            if let Some(v) = node.value.as_ref() {
                return Some((Network::from_bits(bits, depth, v4), v));
            }
        }
        None
    }
}

impl<V> FromIterator<(Network, V)> for NetworkTree<V> {
    fn from_iter<I: IntoIterator<Item = (Network, V)>>(iter: I) -> Self {
        let mut tree = NetworkTree::new();
        for (n, v) in iter {
            tree.insert(n, v);
        }
        tree
    }
}
