//! Attribute values.
//!
//! A [`Value`] is an immutable tagged union over the builtin [`Type`]s.
//! Collections are shared behind `Arc` so cloning a value (which happens on
//! every attribute lookup) never copies a set.
//!
//! Every value has a canonical text form produced by [`Value::serialize`]
//! which [`Value::parse`] accepts back.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::domain::DomainName;
use crate::error::{EvalError, EvalErrorKind, ValueError};
use crate::network::Network;
use crate::tree::{DomainTree, NetworkTree};
use crate::types::Type;

/// Largest magnitude a float can have and still be converted to an integer
/// exactly (2^53).
pub const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

const DESCRIBE_LIMIT: usize = 2;

#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    String(String),
    Integer(i64),
    Float(f64),
    Address(IpAddr),
    Network(Network),
    Domain(DomainName),
    SetOfStrings(Arc<BTreeSet<String>>),
    SetOfNetworks(Arc<NetworkTree<()>>),
    SetOfDomains(Arc<DomainTree<()>>),
    ListOfStrings(Arc<Vec<String>>),
}

impl Value {
    pub fn value_type(&self) -> Type {
        match self {
            Value::Boolean(_) => Type::Boolean,
            Value::String(_) => Type::String,
            Value::Integer(_) => Type::Integer,
            Value::Float(_) => Type::Float,
            Value::Address(_) => Type::Address,
            Value::Network(_) => Type::Network,
            Value::Domain(_) => Type::Domain,
            Value::SetOfStrings(_) => Type::SetOfStrings,
            Value::SetOfNetworks(_) => Type::SetOfNetworks,
            Value::SetOfDomains(_) => Type::SetOfDomains,
            Value::ListOfStrings(_) => Type::ListOfStrings,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Integer from a floating point source. Fails outside of ±2^53 and on
    /// any fractional part.
    pub fn integer_from_f64(x: f64) -> Result<Self, ValueError> {
        if !x.is_finite() || !(-MAX_EXACT_INTEGER..=MAX_EXACT_INTEGER).contains(&x) {
            return Err(ValueError::IntegerOverflow(x));
        }
        if x.fract() != 0.0 {
            return Err(ValueError::FractionalInteger(x));
        }
        Ok(Value::Integer(x as i64))
    }

    pub fn set_of_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::SetOfStrings(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn set_of_networks<I: IntoIterator<Item = Network>>(items: I) -> Self {
        Value::SetOfNetworks(Arc::new(items.into_iter().map(|n| (n, ())).collect()))
    }

    pub fn set_of_domains<I: IntoIterator<Item = DomainName>>(items: I) -> Self {
        Value::SetOfDomains(Arc::new(items.into_iter().map(|d| (d, ())).collect()))
    }

    pub fn list_of_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::ListOfStrings(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Builds a value of type `ty` from its text form.
    pub fn parse(ty: Type, s: &str) -> Result<Self, ValueError> {
        match ty {
            Type::Boolean => parse_bool(s).map(Value::Boolean),
            Type::String => Ok(Value::String(s.to_string())),
            Type::Integer => parse_int(s).map(Value::Integer),
            Type::Float => parse_float(s).map(Value::Float),
            Type::Address => parse_addr(s).map(Value::Address),
            Type::Network => Network::parse(s.trim()).map(Value::Network),
            Type::Domain => DomainName::parse(s.trim()).map(Value::Domain),
            Type::SetOfStrings => Ok(Value::set_of_strings(parse_items(ty, s)?)),
            Type::SetOfNetworks => {
                let mut nets = Vec::new();
                for item in parse_items(ty, s)? {
                    nets.push(Network::parse(&item).map_err(|e| collection_error(ty, s, e))?);
                }
                Ok(Value::set_of_networks(nets))
            }
            Type::SetOfDomains => {
                let mut domains = Vec::new();
                for item in parse_items(ty, s)? {
                    domains.push(DomainName::parse(&item).map_err(|e| collection_error(ty, s, e))?);
                }
                Ok(Value::set_of_domains(domains))
            }
            Type::ListOfStrings => Ok(Value::list_of_strings(parse_items(ty, s)?)),
        }
    }

    /// Canonical text form.
    pub fn serialize(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Address(a) => a.to_string(),
            Value::Network(n) => n.to_string(),
            Value::Domain(d) => d.to_string(),
            Value::SetOfStrings(set) => join_quoted(set.iter().map(String::as_str)),
            Value::SetOfNetworks(tree) => {
                let items: Vec<String> = tree.iter().map(|(n, _)| n.to_string()).collect();
                join_quoted(items.iter().map(String::as_str))
            }
            Value::SetOfDomains(tree) => {
                let items: Vec<DomainName> = tree.iter().map(|(d, _)| d).collect();
                join_quoted(items.iter().map(DomainName::as_str))
            }
            Value::ListOfStrings(list) => join_quoted(list.iter().map(String::as_str)),
        }
    }

    /// Short human readable form used in error paths.
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            Value::Domain(d) => format!("domain({d})"),
            Value::SetOfStrings(set) => {
                format!("set({})", truncated(set.iter().map(|s| quote(s))))
            }
            Value::SetOfNetworks(tree) => {
                format!("set({})", truncated(tree.iter().map(|(n, _)| n.to_string())))
            }
            Value::SetOfDomains(tree) => format!(
                "domains({})",
                truncated(tree.iter().map(|(d, _)| quote(d.as_str())))
            ),
            Value::ListOfStrings(list) => {
                format!("[{}]", truncated(list.iter().map(|s| quote(s))))
            }
            other => other.serialize(),
        }
    }

    fn type_error(&self, expected: Type) -> EvalError {
        EvalError::new(EvalErrorKind::ValueType {
            expected,
            actual: self.value_type(),
        })
        .bind(self.describe())
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.type_error(Type::Boolean)),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self.type_error(Type::String)),
        }
    }

    pub fn as_integer(&self) -> Result<i64, EvalError> {
        match self {
            Value::Integer(i) => Ok(*i),
            _ => Err(self.type_error(Type::Integer)),
        }
    }

    pub fn as_float(&self) -> Result<f64, EvalError> {
        match self {
            Value::Float(f) => Ok(*f),
            _ => Err(self.type_error(Type::Float)),
        }
    }

    pub fn as_address(&self) -> Result<IpAddr, EvalError> {
        match self {
            Value::Address(a) => Ok(*a),
            _ => Err(self.type_error(Type::Address)),
        }
    }

    pub fn as_network(&self) -> Result<&Network, EvalError> {
        match self {
            Value::Network(n) => Ok(n),
            _ => Err(self.type_error(Type::Network)),
        }
    }

    pub fn as_domain(&self) -> Result<&DomainName, EvalError> {
        match self {
            Value::Domain(d) => Ok(d),
            _ => Err(self.type_error(Type::Domain)),
        }
    }

    pub fn as_set_of_strings(&self) -> Result<&BTreeSet<String>, EvalError> {
        match self {
            Value::SetOfStrings(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfStrings)),
        }
    }

    pub fn as_set_of_networks(&self) -> Result<&NetworkTree<()>, EvalError> {
        match self {
            Value::SetOfNetworks(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfNetworks)),
        }
    }

    pub fn as_set_of_domains(&self) -> Result<&DomainTree<()>, EvalError> {
        match self {
            Value::SetOfDomains(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfDomains)),
        }
    }

    pub fn as_list_of_strings(&self) -> Result<&[String], EvalError> {
        match self {
            Value::ListOfStrings(l) => Ok(l),
            _ => Err(self.type_error(Type::ListOfStrings)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Address(a), Value::Address(b)) => a == b,
            (Value::Network(a), Value::Network(b)) => a == b,
            (Value::Domain(a), Value::Domain(b)) => a == b,
            (Value::SetOfStrings(a), Value::SetOfStrings(b)) => a == b,
            (Value::SetOfNetworks(a), Value::SetOfNetworks(b)) => {
                a.len() == b.len() && a.iter().map(|(n, _)| n).eq(b.iter().map(|(n, _)| n))
            }
            (Value::SetOfDomains(a), Value::SetOfDomains(b)) => {
                a.len() == b.len() && a.iter().map(|(d, _)| d).eq(b.iter().map(|(d, _)| d))
            }
            (Value::ListOfStrings(a), Value::ListOfStrings(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<IpAddr> for Value {
    fn from(a: IpAddr) -> Self {
        Value::Address(a)
    }
}

impl From<Network> for Value {
    fn from(n: Network) -> Self {
        Value::Network(n)
    }
}

impl From<DomainName> for Value {
    fn from(d: DomainName) -> Self {
        Value::Domain(d)
    }
}

fn parse_bool(s: &str) -> Result<bool, ValueError> {
    match s.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ValueError::InvalidBoolean {
            text: s.to_string(),
        }),
    }
}

fn parse_int(s: &str) -> Result<i64, ValueError> {
    let invalid = || ValueError::InvalidInteger {
        text: s.to_string(),
    };

    let t = s.trim();
    let (neg, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };

    let (radix, body) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return Err(invalid());
    }

    // parse as u64 first so i64::MIN is representable
    let magnitude = u64::from_str_radix(body, radix).map_err(|_| invalid())?;
    if neg {
        0i64.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}

fn parse_addr(s: &str) -> Result<IpAddr, ValueError> {
    s.trim().parse().map_err(|_| ValueError::InvalidAddress {
        text: s.to_string(),
    })
}

fn parse_items(ty: Type, s: &str) -> Result<Vec<String>, ValueError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<String>>(&format!("[{s}]")).map_err(|e| {
        ValueError::InvalidCollection {
            text: s.to_string(),
            ty,
            reason: e.to_string(),
        }
    })
}

fn collection_error(ty: Type, s: &str, e: ValueError) -> ValueError {
    ValueError::InvalidCollection {
        text: s.to_string(),
        ty,
        reason: e.to_string(),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn join_quoted<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.map(quote).collect::<Vec<_>>().join(",")
}

fn truncated(items: impl Iterator<Item = String>) -> String {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if out.len() == DESCRIBE_LIMIT {
            out.push("...".to_string());
            break;
        }
        out.push(item);
    }
    out.join(", ")
}

fn parse_float(s: &str) -> Result<f64, ValueError> {
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f),
        _ => Err(ValueError::InvalidFloat {
            text: s.to_string(),
        }),
    }
}
