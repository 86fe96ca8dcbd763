//! pdp core: typed values, lookup tries, content storage and the error
//! surface shared by the evaluation engine.
//!
//! Nothing here knows about policies. Values and content are immutable
//! snapshots; content updates produce new snapshots through transactions.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as an error value, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod content;
pub mod domain;
pub mod error;
pub mod network;
pub mod tree;
pub mod types;
pub mod update;
pub mod value;

pub use content::{
    Aggregation, ContentItem, ContentKey, ContentNode, LocalContent, LocalContentStorage, Shard,
    ShardRequest, ShardResolver,
};
pub use domain::DomainName;
pub use error::{
    BuildError, BuildErrorKind, ErrorCode, EvalError, EvalErrorKind, PdpError, Result,
    UpdateError, UpdateErrorKind, ValueError,
};
pub use network::Network;
pub use types::Type;
pub use update::UpdateOp;
pub use value::Value;
