//! Policy storage and its update protocol.
//!
//! Mirrors the content update protocol: a transaction is opened against the
//! storage tag, applies whole updates on a copy-on-write tree and commits
//! into a new storage.

use std::fmt;
use std::sync::Arc;

use pdp_core::{BuildErrorKind, UpdateError, UpdateErrorKind, UpdateOp};
use tracing::debug;
use uuid::Uuid;

use crate::build::DEFAULT_MAX_DEPTH;
use crate::context::Context;
use crate::effect::Response;
use crate::policy::{Entity, Evaluable};

/// Root of the policy tree plus the tag of its version.
#[derive(Debug, Clone)]
pub struct PolicyStorage {
    tag: Option<Uuid>,
    root: Option<Arc<dyn Evaluable>>,
    max_depth: usize,
}

impl Default for PolicyStorage {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl PolicyStorage {
    /// Untagged storage can be evaluated and swapped but not updated.
    pub fn new(root: Option<Arc<dyn Evaluable>>, tag: Option<Uuid>) -> Self {
        Self {
            tag,
            root,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Nesting limit enforced on updates.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn tag(&self) -> Option<Uuid> {
        self.tag
    }

    pub fn root(&self) -> Option<&Arc<dyn Evaluable>> {
        self.root.as_ref()
    }

    /// NotApplicable when there is no root.
    pub fn calculate(&self, ctx: &Context) -> Response {
        match &self.root {
            Some(root) => root.calculate(ctx),
            None => Response::not_applicable(),
        }
    }

    /// Opens a transaction if the storage tag equals `tag`.
    pub fn new_transaction(&self, tag: &Uuid) -> Result<PolicyTransaction, UpdateError> {
        let current = self.tag.ok_or_else(|| UpdateError::new(UpdateErrorKind::UntaggedStorage))?;
        if current != *tag {
            return Err(UpdateErrorKind::TagMismatch {
                expected: current,
                actual: *tag,
            }
            .into());
        }

        Ok(PolicyTransaction {
            tag: current,
            root: self.root.clone(),
            max_depth: self.max_depth,
        })
    }
}

/// Single add or delete command of a policy update.
#[derive(Debug, Clone)]
pub struct PolicyCommand {
    pub op: UpdateOp,
    /// Ids from the root down to the addressed node.
    pub path: Vec<String>,
    /// Node to add. Ignored by delete.
    pub entity: Option<Entity>,
}

/// Ordered commands moving policies from tag `from` to tag `to`.
#[derive(Debug, Clone)]
pub struct PolicyUpdate {
    from: Uuid,
    to: Uuid,
    cmds: Vec<PolicyCommand>,
}

impl PolicyUpdate {
    pub fn new(from: Uuid, to: Uuid) -> Self {
        Self {
            from,
            to,
            cmds: Vec::new(),
        }
    }

    pub fn append(&mut self, op: UpdateOp, path: Vec<String>, entity: Option<Entity>) {
        self.cmds.push(PolicyCommand { op, path, entity });
    }

    pub fn from_tag(&self) -> Uuid {
        self.from
    }

    pub fn to_tag(&self) -> Uuid {
        self.to
    }

    pub fn commands(&self) -> &[PolicyCommand] {
        &self.cmds
    }
}

impl fmt::Display for PolicyUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "policy update: {} -> {}", self.from, self.to)?;
        for cmd in &self.cmds {
            writeln!(f, "- {} {}", cmd.op, cmd.path.join("/"))?;
        }
        Ok(())
    }
}

/// Pending modification of the policy tree.
#[derive(Debug)]
pub struct PolicyTransaction {
    tag: Uuid,
    root: Option<Arc<dyn Evaluable>>,
    max_depth: usize,
}

impl PolicyTransaction {
    /// Tag the transaction is currently at.
    pub fn tag(&self) -> Uuid {
        self.tag
    }

    /// Applies every command of `update` or none of them.
    pub fn apply(&mut self, update: &PolicyUpdate) -> Result<(), UpdateError> {
        if update.from != self.tag {
            return Err(UpdateErrorKind::TagMismatch {
                expected: self.tag,
                actual: update.from,
            }
            .into());
        }

        let mut root = self.root.clone();
        for (i, cmd) in update.cmds.iter().enumerate() {
            root = apply_command(root, cmd)
                .and_then(|r| self.check_depth(r))
                .map_err(|e| e.bind(format!("command #{i}")))?;
            debug!(op = %cmd.op, path = %cmd.path.join("/"), "policy command applied");
        }

        self.root = root;
        self.tag = update.to;
        Ok(())
    }

    pub fn commit(self) -> PolicyStorage {
        PolicyStorage {
            tag: Some(self.tag),
            root: self.root,
            max_depth: self.max_depth,
        }
    }

    fn check_depth(
        &self,
        root: Option<Arc<dyn Evaluable>>,
    ) -> Result<Option<Arc<dyn Evaluable>>, UpdateError> {
        match &root {
            Some(r) if r.depth() > self.max_depth => {
                Err(UpdateErrorKind::Build(BuildErrorKind::TooDeep(self.max_depth)).into())
            }
            _ => Ok(root),
        }
    }
}

fn apply_command(
    root: Option<Arc<dyn Evaluable>>,
    cmd: &PolicyCommand,
) -> Result<Option<Arc<dyn Evaluable>>, UpdateError> {
    let path: Vec<&str> = cmd.path.iter().map(String::as_str).collect();

    match cmd.op {
        UpdateOp::Add => {
            let entity = cmd.entity.as_ref().ok_or_else(|| {
                UpdateError::new(UpdateErrorKind::InvalidEntity("policy, policy set or rule"))
            })?;
            let Some((first, rest)) = path.split_first() else {
                return replace_root(entity).map(Some);
            };
            let root = checked_root(root, first)?;
            Ok(Some(root.append(rest, entity)?))
        }
        UpdateOp::Delete => {
            let (first, rest) = path
                .split_first()
                .ok_or_else(|| UpdateError::new(UpdateErrorKind::EmptyPath))?;
            let root = checked_root(root, first)?;
            if rest.is_empty() {
                return Ok(None);
            }
            Ok(Some(root.delete(rest)?))
        }
    }
}

fn replace_root(entity: &Entity) -> Result<Arc<dyn Evaluable>, UpdateError> {
    match entity {
        Entity::Evaluable(e) if e.id().is_some() => Ok(e.clone()),
        Entity::Evaluable(e) => Err(UpdateErrorKind::HiddenAppend(e.kind()).into()),
        Entity::Rule(_) => Err(UpdateErrorKind::InvalidEntity("policy or policy set").into()),
    }
}

fn checked_root(
    root: Option<Arc<dyn Evaluable>>,
    id: &str,
) -> Result<Arc<dyn Evaluable>, UpdateError> {
    let root = root.ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingChild(id.to_string())))?;
    match root.id().map(str::to_string) {
        Some(actual) if actual == id => Ok(root),
        Some(actual) => Err(UpdateErrorKind::InvalidRoot {
            expected: actual,
            actual: id.to_string(),
        }
        .into()),
        None => Err(UpdateErrorKind::HiddenModification(root.kind()).into()),
    }
}
