//! Domain names.
//!
//! Names are stored lower case without the trailing dot. Labels are kept in
//! presentation order; suffix trees walk them from the last one.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// Validated, lower-cased domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName {
    name: String,
}

impl DomainName {
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(invalid(s, "empty domain name"));
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(invalid(s, "domain name too long"));
        }

        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(invalid(s, "empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(invalid(s, "label too long"));
            }
            if let Some(c) = label
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '*'))
            {
                return Err(invalid(s, &format!("invalid character {c:?}")));
            }
        }

        Ok(Self {
            name: trimmed.to_ascii_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Labels from the top level domain down ("com", "example", "www").
    pub fn labels_rev(&self) -> impl Iterator<Item = &str> {
        self.name.rsplit('.')
    }

    pub(crate) fn from_labels_rev(labels: &[&str]) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }
        let name = labels.iter().rev().copied().collect::<Vec<_>>().join(".");
        Some(Self { name })
    }

    /// True if `self` equals `other` or is one of its subdomains.
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        if self.name == other.name {
            return true;
        }
        self.name.len() > other.name.len()
            && self.name.ends_with(other.name.as_str())
            && self.name.as_bytes()[self.name.len() - other.name.len() - 1] == b'.'
    }
}

fn invalid(s: &str, reason: &str) -> ValueError {
    ValueError::InvalidDomain {
        text: s.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for DomainName {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::parse(s)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
