//! Ordered lookup trees backing set values and content maps.
//!
//! - strings: `BTreeMap`/`BTreeSet` (exact match, lexicographic order)
//! - networks: [`NetworkTree`] (longest prefix match)
//! - domains: [`DomainTree`] (longest suffix match on label boundaries)

pub mod domain_tree;
pub mod network_tree;

pub use domain_tree::DomainTree;
pub use network_tree::NetworkTree;
