//! pdp engine: policy trees, combining algorithms and the decision
//! protocol on top of `pdp-core` values and content.
//!
//! Trees are built through [`BuildContext`], evaluated against a per-request
//! [`Context`] and replaced or patched through [`PolicyStorage`]
//! transactions. [`Pdp`] holds the live snapshots.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Evaluation never
//! fails as a call: errors become Indeterminate responses carrying the
//! error as status.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod algorithm;
pub mod attribute;
pub mod build;
pub mod config;
pub mod context;
pub mod effect;
pub mod expression;
pub mod pdp;
pub mod policy;
pub mod rule;
pub mod storage;
pub mod target;

pub use algorithm::{AlgorithmRegistry, BasicAlg, Combinable, CombiningAlg, MapperAlg, MapperParams};
pub use attribute::{Attribute, AttributeAssignment, AttributeAssignmentExpression, Obligations};
pub use build::BuildContext;
pub use config::PdpConfig;
pub use context::Context;
pub use effect::{Decision, Effect, Response};
pub use expression::{Expression, FunctionRegistry, Selector, SelectorOptions};
pub use pdp::Pdp;
pub use policy::{Entity, Evaluable, Policy, PolicySet};
pub use rule::Rule;
pub use storage::{PolicyCommand, PolicyStorage, PolicyTransaction, PolicyUpdate};
pub use target::{AllOf, AnyOf, Match, Target};
