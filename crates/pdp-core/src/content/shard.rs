//! Content shards.
//!
//! A shard claims an inclusive range of first-level string keys. Lookups in
//! a shard that lists servers aren't served locally; the selector hands them
//! to the caller's [`ShardResolver`].

use serde::{Deserialize, Serialize};

use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shard {
    pub name: String,
    pub min: String,
    pub max: String,
    #[serde(default)]
    pub servers: Vec<String>,
}

impl Shard {
    pub fn new(name: impl Into<String>, min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min: min.into(),
            max: max.into(),
            servers: Vec::new(),
        }
    }

    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.min.as_str() <= key && key <= self.max.as_str()
    }

    /// Remote shards are resolved by the caller.
    pub fn is_remote(&self) -> bool {
        !self.servers.is_empty()
    }
}

/// Lookup delegated to a remote shard.
#[derive(Debug, Clone, Copy)]
pub struct ShardRequest<'a> {
    pub shard: &'a Shard,
    pub content: &'a str,
    pub item: &'a str,
    pub path: &'a [Value],
    pub value_type: Type,
}

/// Caller supplied resolver for remote shards.
///
/// Called synchronously from inside `calculate`; there is no timeout, so
/// implementations bound their own latency. Failures become evaluation
/// errors.
pub trait ShardResolver: Send + Sync {
    fn resolve(&self, req: &ShardRequest<'_>) -> Result<Value, String>;
}

impl<F> ShardResolver for F
where
    F: Fn(&ShardRequest<'_>) -> Result<Value, String> + Send + Sync,
{
    fn resolve(&self, req: &ShardRequest<'_>) -> Result<Value, String> {
        self(req)
    }
}
