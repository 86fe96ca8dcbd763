//! Top-level facade crate for the policy decision point.
//!
//! Re-exports the core primitives and the evaluation engine so users can depend on a single crate.

pub mod core {
    pub use pdp_core::*;
}

pub mod engine {
    pub use pdp_engine::*;
}
