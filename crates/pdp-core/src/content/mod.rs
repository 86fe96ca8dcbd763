//! Content storage: named, typed lookup tables read by selectors.
//!
//! A [`ContentItem`] is either a single value or a nested map where each
//! level declares its own key type:
//! - `String` levels use exact matching (ordered map),
//! - `Address`/`Network` levels use longest-prefix matching,
//! - `Domain` levels use longest-suffix matching.
//!
//! Missing keys are misses, not errors; the selector decides what a miss
//! means.

use std::collections::BTreeMap;

use serde_json::json;

use crate::domain::DomainName;
use crate::error::{BuildError, BuildErrorKind, EvalError, EvalErrorKind};
use crate::network::Network;
use crate::tree::{DomainTree, NetworkTree};
use crate::types::Type;
use crate::value::Value;

pub mod shard;
pub mod storage;

pub use shard::{Shard, ShardRequest, ShardResolver};
pub use storage::{ContentCommand, ContentTransaction, ContentUpdate, LocalContent, LocalContentStorage};

/// How a selector combines the leaves it finds at multi-valued path keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Concatenate every leaf list in lookup order.
    Append,
    /// Same as `Append` but keep only the first occurrence of each string.
    AppendUnique,
}

impl Aggregation {
    pub fn from_name(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("append") {
            Some(Aggregation::Append)
        } else if s.eq_ignore_ascii_case("appendunique") {
            Some(Aggregation::AppendUnique)
        } else {
            None
        }
    }
}

/// Key of one map level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKey {
    String(String),
    Network(Network),
    Domain(DomainName),
}

impl ContentKey {
    /// Parses `s` as a key of a level declared with type `ty`.
    pub fn parse(ty: Type, s: &str) -> Result<Self, String> {
        match ty {
            Type::String => Ok(ContentKey::String(s.to_string())),
            Type::Address | Type::Network => match Network::parse(s) {
                Ok(n) => Ok(ContentKey::Network(n)),
                Err(_) => s
                    .parse()
                    .map(|a| ContentKey::Network(Network::host(a)))
                    .map_err(|_| format!("expected address or network for {ty} key")),
            },
            Type::Domain => DomainName::parse(s)
                .map(ContentKey::Domain)
                .map_err(|e| e.to_string()),
            other => Err(format!("{other} can't be a content key")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentNode {
    Value(Value),
    Strings(BTreeMap<String, ContentNode>),
    Networks(NetworkTree<ContentNode>),
    Domains(DomainTree<ContentNode>),
}

impl ContentNode {
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, ContentNode)>,
        S: Into<String>,
    {
        ContentNode::Strings(items.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn networks<I: IntoIterator<Item = (Network, ContentNode)>>(items: I) -> Self {
        ContentNode::Networks(items.into_iter().collect())
    }

    pub fn domains<I: IntoIterator<Item = (DomainName, ContentNode)>>(items: I) -> Self {
        ContentNode::Domains(items.into_iter().collect())
    }

    /// Empty map of the kind a level keyed by `ty` uses.
    pub fn empty_map(ty: Type) -> Option<Self> {
        match ty {
            Type::String => Some(ContentNode::Strings(BTreeMap::new())),
            Type::Address | Type::Network => Some(ContentNode::Networks(NetworkTree::new())),
            Type::Domain => Some(ContentNode::Domains(DomainTree::new())),
            _ => None,
        }
    }

    pub(crate) fn child_mut(&mut self, key: &ContentKey) -> Option<&mut ContentNode> {
        match (self, key) {
            (ContentNode::Strings(m), ContentKey::String(k)) => m.get_mut(k),
            (ContentNode::Networks(t), ContentKey::Network(n)) => t.get_exact_mut(n),
            (ContentNode::Domains(t), ContentKey::Domain(d)) => t.get_exact_mut(d),
            _ => None,
        }
    }

    /// Inserts or replaces a child. Fails if the key doesn't fit this map.
    pub(crate) fn insert(&mut self, key: ContentKey, node: ContentNode) -> bool {
        match (self, key) {
            (ContentNode::Strings(m), ContentKey::String(k)) => {
                m.insert(k, node);
                true
            }
            (ContentNode::Networks(t), ContentKey::Network(n)) => {
                t.insert(n, node);
                true
            }
            (ContentNode::Domains(t), ContentKey::Domain(d)) => {
                t.insert(&d, node);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, key: &ContentKey) -> Option<ContentNode> {
        match (self, key) {
            (ContentNode::Strings(m), ContentKey::String(k)) => m.remove(k),
            (ContentNode::Networks(t), ContentKey::Network(n)) => t.remove(n),
            (ContentNode::Domains(t), ContentKey::Domain(d)) => t.remove(d),
            _ => None,
        }
    }

    /// Children matching `key`, in lookup order. Multi-valued keys fan out.
    fn matching(&self, key: &Value, level: usize) -> Result<Vec<&ContentNode>, EvalError> {
        let wrong_key = |expected: &'static str| {
            EvalError::new(EvalErrorKind::InvalidContentKey {
                level,
                expected,
                actual: key.value_type(),
            })
        };

        let found: Vec<&ContentNode> = match self {
            ContentNode::Value(_) => return Err(EvalErrorKind::MapContentSubitem.into()),
            ContentNode::Strings(m) => match key {
                Value::String(s) => m.get(s).into_iter().collect(),
                Value::SetOfStrings(set) => set.iter().filter_map(|s| m.get(s)).collect(),
                Value::ListOfStrings(list) => list.iter().filter_map(|s| m.get(s)).collect(),
                _ => return Err(wrong_key("String")),
            },
            ContentNode::Networks(t) => match key {
                Value::Address(a) => t.get_by_addr(a).into_iter().collect(),
                Value::Network(n) => t.get_by_net(n).into_iter().collect(),
                Value::SetOfNetworks(set) => set.iter().filter_map(|(n, _)| t.get_by_net(&n)).collect(),
                _ => return Err(wrong_key("Address or Network")),
            },
            ContentNode::Domains(t) => match key {
                Value::Domain(d) => t.get(d).into_iter().collect(),
                Value::SetOfDomains(set) => set.iter().filter_map(|(d, _)| t.get(&d)).collect(),
                _ => return Err(wrong_key("Domain")),
            },
        };
        Ok(found)
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            ContentNode::Value(v) => value_to_json(v),
            ContentNode::Strings(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            ContentNode::Networks(t) => serde_json::Value::Object(
                t.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
            ContentNode::Domains(t) => serde_json::Value::Object(
                t.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
        }
    }
}

/// Typed content item: value type, key signature and data.
#[derive(Debug, Clone)]
pub struct ContentItem {
    value_type: Type,
    keys: Vec<Type>,
    root: ContentNode,
    shards: Vec<Shard>,
}

impl ContentItem {
    /// Item holding a single value.
    pub fn value(value: Value) -> Self {
        Self {
            value_type: value.value_type(),
            keys: Vec::new(),
            root: ContentNode::Value(value),
            shards: Vec::new(),
        }
    }

    /// Nested map item. Every level of `root` must match `keys` and every
    /// leaf must be of `value_type`.
    pub fn mapping(value_type: Type, keys: Vec<Type>, root: ContentNode) -> Result<Self, BuildError> {
        if keys.is_empty() {
            return Err(invalid_item("mapping needs at least one key"));
        }
        if let Some(t) = keys.iter().find(|t| !t.is_content_key()) {
            return Err(invalid_item(&format!("{t} can't be a content key")));
        }
        validate(&root, value_type, &keys)?;

        Ok(Self {
            value_type,
            keys,
            root,
            shards: Vec::new(),
        })
    }

    pub fn with_shards(mut self, shards: Vec<Shard>) -> Self {
        self.shards = shards;
        self
    }

    pub fn value_type(&self) -> Type {
        self.value_type
    }

    pub fn keys(&self) -> &[Type] {
        &self.keys
    }

    pub fn root(&self) -> &ContentNode {
        &self.root
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// First shard whose range holds `key`.
    pub fn shard_for(&self, key: &str) -> Option<&Shard> {
        self.shards.iter().find(|s| s.contains(key))
    }

    /// Walks the item with evaluated path keys.
    ///
    /// Without aggregation the first leaf found wins. With aggregation every
    /// leaf reachable through multi-valued keys is merged into one list.
    pub fn lookup(&self, path: &[Value], aggregation: Option<Aggregation>) -> Result<Value, EvalError> {
        if path.len() != self.keys.len() {
            return Err(EvalErrorKind::InvalidSelectorPath {
                expected: self.keys.len(),
                actual: path.len(),
            }
            .into());
        }

        let mut leaves = Vec::new();
        walk(&self.root, path, 0, aggregation.is_none(), &mut leaves)?;

        let Some(agg) = aggregation else {
            return leaves
                .first()
                .map(|v| (*v).clone())
                .ok_or_else(|| EvalErrorKind::MissingValue.into());
        };
        if leaves.is_empty() {
            return Err(EvalErrorKind::MissingValue.into());
        }

        let mut out: Vec<String> = Vec::new();
        for leaf in leaves {
            let items: &[String] = match leaf {
                Value::ListOfStrings(l) => l,
                Value::String(s) => std::slice::from_ref(s),
                other => {
                    return Err(EvalErrorKind::InvalidContentItemType {
                        expected: Type::ListOfStrings,
                        actual: other.value_type(),
                    }
                    .into())
                }
            };
            for s in items {
                if agg == Aggregation::AppendUnique && out.contains(s) {
                    continue;
                }
                out.push(s.clone());
            }
        }
        Ok(Value::list_of_strings(out))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if !self.keys.is_empty() {
            obj.insert(
                "keys".into(),
                json!(self.keys.iter().map(|t| t.name()).collect::<Vec<_>>()),
            );
        }
        obj.insert("type".into(), json!(self.value_type.name()));
        if !self.shards.is_empty() {
            obj.insert("shards".into(), json!(self.shards));
        }
        obj.insert("data".into(), self.root.to_json());
        serde_json::Value::Object(obj)
    }

    pub(crate) fn root_mut(&mut self) -> &mut ContentNode {
        &mut self.root
    }
}

fn walk<'a>(
    node: &'a ContentNode,
    path: &[Value],
    level: usize,
    first_only: bool,
    out: &mut Vec<&'a Value>,
) -> Result<(), EvalError> {
    let Some(key) = path.get(level) else {
        return match node {
            ContentNode::Value(v) => {
                out.push(v);
                Ok(())
            }
            _ => Err(EvalErrorKind::InvalidSelectorPath {
                expected: level + 1,
                actual: level,
            }
            .into()),
        };
    };

    for child in node.matching(key, level).map_err(|e| e.bind(key.describe()))? {
        walk(child, path, level + 1, first_only, out).map_err(|e| e.bind(key.describe()))?;
        if first_only && !out.is_empty() {
            break;
        }
    }
    Ok(())
}

fn validate(node: &ContentNode, value_type: Type, keys: &[Type]) -> Result<(), BuildError> {
    let Some((first, rest)) = keys.split_first() else {
        return match node {
            ContentNode::Value(v) if v.value_type() == value_type => Ok(()),
            ContentNode::Value(v) => Err(invalid_item(&format!(
                "expected {value_type} leaf but got {}",
                v.value_type()
            ))),
            _ => Err(invalid_item("expected value but got map")),
        };
    };

    match (first, node) {
        (Type::String, ContentNode::Strings(m)) => {
            for (k, child) in m {
                validate(child, value_type, rest).map_err(|e| e.bind(k.clone()))?;
            }
        }
        (Type::Address | Type::Network, ContentNode::Networks(t)) => {
            for (k, child) in t.iter() {
                validate(child, value_type, rest).map_err(|e| e.bind(k.to_string()))?;
            }
        }
        (Type::Domain, ContentNode::Domains(t)) => {
            for (k, child) in t.iter() {
                validate(child, value_type, rest).map_err(|e| e.bind(k.to_string()))?;
            }
        }
        (t, _) => return Err(invalid_item(&format!("expected map keyed by {t}"))),
    }
    Ok(())
}

fn invalid_item(msg: &str) -> BuildError {
    BuildError::new(BuildErrorKind::InvalidContentItem(msg.to_string()))
}

fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Boolean(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::SetOfStrings(set) => json!(set.iter().collect::<Vec<_>>()),
        Value::ListOfStrings(list) => json!(list.as_slice()),
        Value::SetOfNetworks(t) => json!(t.iter().map(|(n, _)| n.to_string()).collect::<Vec<_>>()),
        Value::SetOfDomains(t) => json!(t.iter().map(|(d, _)| d.to_string()).collect::<Vec<_>>()),
        other => json!(other.serialize()),
    }
}
