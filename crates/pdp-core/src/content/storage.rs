//! Local content storage and its update protocol.
//!
//! Storage is an immutable snapshot. Updates go through a transaction opened
//! against the current tag of one content; the transaction works on its own
//! copy and `commit` produces a new snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{ContentItem, ContentKey, ContentNode};
use crate::error::{EvalError, EvalErrorKind, UpdateError, UpdateErrorKind};
use crate::types::Type;
use crate::update::UpdateOp;

/// Named group of content items, versioned by an optional tag.
#[derive(Debug, Clone)]
pub struct LocalContent {
    id: String,
    tag: Option<Uuid>,
    items: BTreeMap<String, Arc<ContentItem>>,
}

impl LocalContent {
    pub fn new(id: impl Into<String>, tag: Option<Uuid>) -> Self {
        Self {
            id: id.into(),
            tag,
            items: BTreeMap::new(),
        }
    }

    pub fn with_item(mut self, id: impl Into<String>, item: ContentItem) -> Self {
        self.items.insert(id.into(), Arc::new(item));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> Option<Uuid> {
        self.tag
    }

    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.items.get(id).map(Arc::as_ref)
    }

    /// Items in lexicographic order of their ids.
    pub fn items(&self) -> impl Iterator<Item = (&str, &ContentItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let items: serde_json::Map<String, serde_json::Value> = self
            .items
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({
            "id": self.id,
            "tag": self.tag.map(|t| t.to_string()),
            "items": items,
        })
    }
}

/// Snapshot of every local content, keyed by content id.
#[derive(Debug, Clone, Default)]
pub struct LocalContentStorage {
    contents: HashMap<String, Arc<LocalContent>>,
}

impl LocalContentStorage {
    pub fn new<I: IntoIterator<Item = LocalContent>>(contents: I) -> Self {
        Self {
            contents: contents
                .into_iter()
                .map(|c| (c.id.clone(), Arc::new(c)))
                .collect(),
        }
    }

    pub fn content(&self, id: &str) -> Option<&LocalContent> {
        self.contents.get(id).map(Arc::as_ref)
    }

    /// Content ids in lexicographic order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.contents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn get(&self, content: &str, item: &str) -> Result<&ContentItem, EvalError> {
        let c = self
            .contents
            .get(content)
            .ok_or_else(|| EvalError::new(EvalErrorKind::MissingContent(content.to_string())))?;
        c.item(item)
            .ok_or_else(|| EvalError::new(EvalErrorKind::MissingContentItem(item.to_string())))
    }

    /// New snapshot with `content` added or replaced. Other contents are
    /// shared with this one.
    pub fn with_content(&self, content: LocalContent) -> Self {
        let mut contents = self.contents.clone();
        contents.insert(content.id.clone(), Arc::new(content));
        Self { contents }
    }

    pub fn without_content(&self, id: &str) -> Self {
        let mut contents = self.contents.clone();
        contents.remove(id);
        Self { contents }
    }

    /// Opens a transaction on `content` if its tag equals `tag`.
    pub fn new_transaction(&self, content: &str, tag: &Uuid) -> Result<ContentTransaction, UpdateError> {
        let c = self
            .contents
            .get(content)
            .ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingContent(content.to_string())))?;

        let current = c
            .tag
            .ok_or_else(|| UpdateError::new(UpdateErrorKind::UntaggedStorage).bind(content.to_string()))?;
        if current != *tag {
            return Err(UpdateError::new(UpdateErrorKind::TagMismatch {
                expected: current,
                actual: *tag,
            })
            .bind(content.to_string()));
        }

        Ok(ContentTransaction {
            id: c.id.clone(),
            tag: current,
            items: c.items.clone(),
        })
    }
}

/// Single add or delete command of a content update.
#[derive(Debug, Clone)]
pub struct ContentCommand {
    pub op: UpdateOp,
    /// Item id followed by map keys.
    pub path: Vec<String>,
    /// Item or sub-item to add. Ignored by delete.
    pub entity: Option<ContentItem>,
}

/// Ordered commands moving one content from tag `from` to tag `to`.
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    content: String,
    from: Uuid,
    to: Uuid,
    cmds: Vec<ContentCommand>,
}

impl ContentUpdate {
    pub fn new(content: impl Into<String>, from: Uuid, to: Uuid) -> Self {
        Self {
            content: content.into(),
            from,
            to,
            cmds: Vec::new(),
        }
    }

    pub fn append(&mut self, op: UpdateOp, path: Vec<String>, entity: Option<ContentItem>) {
        self.cmds.push(ContentCommand { op, path, entity });
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn from_tag(&self) -> Uuid {
        self.from
    }

    pub fn to_tag(&self) -> Uuid {
        self.to
    }

    pub fn commands(&self) -> &[ContentCommand] {
        &self.cmds
    }
}

impl fmt::Display for ContentUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "content update {}: {} -> {}", self.content, self.from, self.to)?;
        for cmd in &self.cmds {
            writeln!(f, "- {} {}", cmd.op, cmd.path.join("/"))?;
        }
        Ok(())
    }
}

/// Pending modification of one content.
#[derive(Debug)]
pub struct ContentTransaction {
    id: String,
    tag: Uuid,
    items: BTreeMap<String, Arc<ContentItem>>,
}

impl ContentTransaction {
    pub fn content(&self) -> &str {
        &self.id
    }

    /// Tag the transaction is currently at.
    pub fn tag(&self) -> Uuid {
        self.tag
    }

    /// Applies every command of `update` or none of them.
    pub fn apply(&mut self, update: &ContentUpdate) -> Result<(), UpdateError> {
        if update.content != self.id {
            return Err(UpdateError::new(UpdateErrorKind::InvalidRoot {
                expected: self.id.clone(),
                actual: update.content.clone(),
            }));
        }
        if update.from != self.tag {
            return Err(UpdateError::new(UpdateErrorKind::TagMismatch {
                expected: self.tag,
                actual: update.from,
            })
            .bind(self.id.clone()));
        }

        let mut items = self.items.clone();
        for (i, cmd) in update.cmds.iter().enumerate() {
            apply_command(&mut items, cmd)
                .map_err(|e| e.bind(format!("command #{i}")).bind(self.id.clone()))?;
            debug!(content = %self.id, op = %cmd.op, path = %cmd.path.join("/"), "content command applied");
        }

        self.items = items;
        self.tag = update.to;
        Ok(())
    }

    /// New storage snapshot holding the modified content.
    pub fn commit(self, storage: &LocalContentStorage) -> LocalContentStorage {
        storage.with_content(LocalContent {
            id: self.id,
            tag: Some(self.tag),
            items: self.items,
        })
    }
}

fn apply_command(
    items: &mut BTreeMap<String, Arc<ContentItem>>,
    cmd: &ContentCommand,
) -> Result<(), UpdateError> {
    let (item_id, raw_keys) = cmd
        .path
        .split_first()
        .ok_or_else(|| UpdateError::new(UpdateErrorKind::EmptyPath))?;

    match cmd.op {
        UpdateOp::Add => {
            let entity = cmd
                .entity
                .as_ref()
                .ok_or_else(|| UpdateError::new(UpdateErrorKind::InvalidEntity("content item")))?;
            if raw_keys.is_empty() {
                items.insert(item_id.clone(), Arc::new(entity.clone()));
                return Ok(());
            }

            let item = items
                .get(item_id)
                .ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingChild(item_id.clone())))?;
            let kinds = item.keys().to_vec();
            let keys = parse_keys(&kinds, raw_keys)?;
            if entity.value_type() != item.value_type() || entity.keys() != &kinds[keys.len()..] {
                return Err(UpdateError::new(UpdateErrorKind::InvalidEntity(
                    "content item matching item signature",
                )));
            }

            let mut modified = ContentItem::clone(item);
            insert_at(modified.root_mut(), &kinds, &keys, entity.root().clone())
                .map_err(|e| e.bind(item_id.clone()))?;
            items.insert(item_id.clone(), Arc::new(modified));
        }
        UpdateOp::Delete => {
            if raw_keys.is_empty() {
                items
                    .remove(item_id)
                    .ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingChild(item_id.clone())))?;
                return Ok(());
            }

            let item = items
                .get(item_id)
                .ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingChild(item_id.clone())))?;
            let keys = parse_keys(item.keys(), raw_keys)?;

            let mut modified = ContentItem::clone(item);
            delete_at(modified.root_mut(), &keys, raw_keys).map_err(|e| e.bind(item_id.clone()))?;
            items.insert(item_id.clone(), Arc::new(modified));
        }
    }
    Ok(())
}

fn parse_keys(kinds: &[Type], raw: &[String]) -> Result<Vec<ContentKey>, UpdateError> {
    if let Some(extra) = raw.get(kinds.len()) {
        return Err(UpdateError::new(UpdateErrorKind::PathTooLong(extra.clone())));
    }

    raw.iter()
        .zip(kinds)
        .map(|(s, ty)| {
            ContentKey::parse(*ty, s).map_err(|reason| {
                UpdateError::new(UpdateErrorKind::InvalidKey {
                    key: s.clone(),
                    reason,
                })
            })
        })
        .collect()
}

fn insert_at(
    node: &mut ContentNode,
    kinds: &[Type],
    keys: &[ContentKey],
    sub: ContentNode,
) -> Result<(), UpdateError> {
    let Some((key, rest)) = keys.split_first() else {
        *node = sub;
        return Ok(());
    };

    let mismatch = || {
        UpdateError::new(UpdateErrorKind::InvalidKey {
            key: format!("{key:?}"),
            reason: "key doesn't fit the map".into(),
        })
    };

    if rest.is_empty() {
        return if node.insert(key.clone(), sub) {
            Ok(())
        } else {
            Err(mismatch())
        };
    }

    if node.child_mut(key).is_none() {
        let map = kinds
            .get(1)
            .and_then(|t| ContentNode::empty_map(*t))
            .ok_or_else(|| UpdateError::new(UpdateErrorKind::PathTooShort))?;
        if !node.insert(key.clone(), map) {
            return Err(mismatch());
        }
    }

    match node.child_mut(key) {
        Some(child) => insert_at(child, &kinds[1..], rest, sub),
        None => Err(mismatch()),
    }
}

fn delete_at(node: &mut ContentNode, keys: &[ContentKey], raw: &[String]) -> Result<(), UpdateError> {
    let missing = |i: usize| {
        UpdateError::new(UpdateErrorKind::MissingChild(
            raw.get(i).cloned().unwrap_or_default(),
        ))
    };

    let Some((last, init)) = keys.split_last() else {
        return Err(UpdateError::new(UpdateErrorKind::EmptyPath));
    };

    let mut node = node;
    for (i, key) in init.iter().enumerate() {
        node = node.child_mut(key).ok_or_else(|| missing(i))?;
    }
    node.remove(last).map(|_| ()).ok_or_else(|| missing(init.len()))
}
