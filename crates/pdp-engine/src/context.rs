//! Per-request evaluation context.
//!
//! Holds the request attributes (keyed by name and type) and handles to the
//! content snapshot and shard resolver selectors read through. A context is
//! built once per request and only read during evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use pdp_core::{EvalError, EvalErrorKind, LocalContentStorage, ShardResolver, Type, Value};

use crate::attribute::Attribute;

#[derive(Default)]
pub struct Context {
    attributes: HashMap<String, Vec<Value>>,
    content: Option<Arc<LocalContentStorage>>,
    shards: Option<Arc<dyn ShardResolver>>,
}

impl Context {
    /// Builds a context from `count` attributes produced by `supplier`.
    /// A later attribute replaces an earlier one with the same name and type.
    pub fn new<F, E>(
        content: Option<Arc<LocalContentStorage>>,
        count: usize,
        mut supplier: F,
    ) -> Result<Self, E>
    where
        F: FnMut(usize) -> Result<(String, Value), E>,
    {
        let mut ctx = Context {
            attributes: HashMap::with_capacity(count),
            content,
            shards: None,
        };
        for i in 0..count {
            let (name, value) = supplier(i)?;
            ctx.insert(name, value);
        }
        Ok(ctx)
    }

    pub fn with_shard_resolver(mut self, resolver: Arc<dyn ShardResolver>) -> Self {
        self.shards = Some(resolver);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let values = self.attributes.entry(name.into()).or_default();
        match values.iter_mut().find(|v| v.value_type() == value.value_type()) {
            Some(slot) => *slot = value,
            None => values.push(value),
        }
    }

    pub fn lookup(&self, name: &str, ty: Type) -> Option<&Value> {
        self.attributes
            .get(name)?
            .iter()
            .find(|v| v.value_type() == ty)
    }

    pub fn get(&self, attr: &Attribute) -> Result<&Value, EvalError> {
        self.lookup(attr.id(), attr.ty())
            .ok_or_else(|| EvalError::new(EvalErrorKind::MissingAttribute).bind(attr.describe()))
    }

    pub fn content(&self) -> Option<&LocalContentStorage> {
        self.content.as_deref()
    }

    pub fn shard_resolver(&self) -> Option<&dyn ShardResolver> {
        self.shards.as_deref()
    }

    pub fn len(&self) -> usize {
        self.attributes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("attributes", &self.attributes)
            .field("content", &self.content.is_some())
            .field("shards", &self.shards.is_some())
            .finish()
    }
}
