//! Update operations shared by policy and content updates.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    Add,
    Delete,
}

impl UpdateOp {
    /// Case-insensitive lookup ("add", "Delete", ...).
    pub fn from_name(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("add") {
            Some(UpdateOp::Add)
        } else if s.eq_ignore_ascii_case("delete") {
            Some(UpdateOp::Delete)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UpdateOp::Add => "Add",
            UpdateOp::Delete => "Delete",
        }
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
