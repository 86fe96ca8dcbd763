//! Builtin data types.
//!
//! Every value, attribute, expression and content item is tagged with one of
//! these types. Type names are human readable ("Set of Strings"); type keys
//! are their lower case form and are what deserializers look up.

use std::fmt;

/// Data types the engine works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Boolean,
    String,
    Integer,
    Float,
    Address,
    Network,
    Domain,
    SetOfStrings,
    SetOfNetworks,
    SetOfDomains,
    ListOfStrings,
}

impl Type {
    /// All builtin types in declaration order.
    pub const ALL: [Type; 11] = [
        Type::Boolean,
        Type::String,
        Type::Integer,
        Type::Float,
        Type::Address,
        Type::Network,
        Type::Domain,
        Type::SetOfStrings,
        Type::SetOfNetworks,
        Type::SetOfDomains,
        Type::ListOfStrings,
    ];

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Type::Boolean => "Boolean",
            Type::String => "String",
            Type::Integer => "Integer",
            Type::Float => "Float",
            Type::Address => "Address",
            Type::Network => "Network",
            Type::Domain => "Domain",
            Type::SetOfStrings => "Set of Strings",
            Type::SetOfNetworks => "Set of Networks",
            Type::SetOfDomains => "Set of Domains",
            Type::ListOfStrings => "List of Strings",
        }
    }

    /// Type key (lower case name).
    pub fn key(self) -> &'static str {
        match self {
            Type::Boolean => "boolean",
            Type::String => "string",
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Address => "address",
            Type::Network => "network",
            Type::Domain => "domain",
            Type::SetOfStrings => "set of strings",
            Type::SetOfNetworks => "set of networks",
            Type::SetOfDomains => "set of domains",
            Type::ListOfStrings => "list of strings",
        }
    }

    /// Case-insensitive lookup by key or name.
    pub fn from_key(s: &str) -> Option<Type> {
        let s = s.trim();
        Type::ALL
            .iter()
            .copied()
            .find(|t| t.key().eq_ignore_ascii_case(s))
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }

    /// Types a content map level can be keyed by.
    pub fn is_content_key(self) -> bool {
        matches!(
            self,
            Type::String | Type::Address | Type::Network | Type::Domain
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins type names for error messages ("String, Integer").
pub fn describe_types(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}
