//! Function registry and function calls.
//!
//! Functions are resolved by name and exact argument types when a call is
//! built. There is no widening: integer/float mixing is supported only
//! because numeric functions register every mixed signature explicitly.

use std::collections::HashMap;
use std::fmt;

use pdp_core::types::describe_types;
use pdp_core::{BuildError, BuildErrorKind, EvalError, EvalErrorKind, Type, Value};
use regex::Regex;

use super::{builtin, Expression};
use crate::context::Context;

/// Works on evaluated arguments.
pub type EagerFn = fn(&[Value]) -> Result<Value, EvalError>;
/// Controls evaluation of its own arguments (short-circuit, fallbacks).
pub type LazyFn = fn(&[Expression], &Context) -> Result<Value, EvalError>;

#[derive(Clone, Copy)]
pub enum Implementation {
    Eager(EagerFn),
    Lazy(LazyFn),
    /// Pattern match. The first argument holds the patterns and must be an
    /// immediate String, Set of Strings or List of Strings; patterns are
    /// compiled once when the call is built.
    Pattern(Matcher),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    Regex,
    /// `*` any run of characters, `?` one character, `\` escapes the next
    /// character. Matches the whole subject.
    Wildcard,
}

/// How pattern and subject collections combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Some pattern matches some subject.
    Any,
    /// Every pattern matches every subject.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    pub syntax: PatternSyntax,
    pub quantifier: Quantifier,
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Eager(_) => f.write_str("Eager"),
            Implementation::Lazy(_) => f.write_str("Lazy"),
            Implementation::Pattern(m) => f.debug_tuple("Pattern").field(m).finish(),
        }
    }
}

/// Accepted argument types.
#[derive(Debug, Clone, Copy)]
pub enum Params {
    Exact(&'static [Type]),
    /// Between `min` and `max` arguments, each of any of `types`.
    Each {
        types: &'static [Type],
        min: usize,
        max: Option<usize>,
    },
    /// At least `min` arguments, all of the same type.
    Same { min: usize },
}

#[derive(Debug, Clone, Copy)]
pub enum Returns {
    Fixed(Type),
    FirstArg,
}

#[derive(Debug, Clone, Copy)]
pub struct Overload {
    pub params: Params,
    pub returns: Returns,
    pub imp: Implementation,
}

impl Overload {
    pub const fn exact(args: &'static [Type], result: Type, imp: Implementation) -> Self {
        Self {
            params: Params::Exact(args),
            returns: Returns::Fixed(result),
            imp,
        }
    }

    fn accepts<I>(&self, mut types: I, n: usize) -> bool
    where
        I: Iterator<Item = Type>,
    {
        match self.params {
            Params::Exact(expected) => n == expected.len() && types.zip(expected).all(|(t, e)| t == *e),
            Params::Each { types: allowed, min, max } => {
                n >= min && max.map_or(true, |m| n <= m) && types.all(|t| allowed.contains(&t))
            }
            Params::Same { min } => {
                let Some(first) = types.next() else {
                    return min == 0;
                };
                n >= min && types.all(|t| t == first)
            }
        }
    }

    /// Result type for argument types `args`, if they are accepted.
    pub fn result_for(&self, args: &[Type]) -> Option<Type> {
        if !self.accepts(args.iter().copied(), args.len()) {
            return None;
        }
        match self.returns {
            Returns::Fixed(t) => Some(t),
            Returns::FirstArg => args.first().copied(),
        }
    }

    fn accepts_values(&self, args: &[Value]) -> bool {
        self.accepts(args.iter().map(Value::value_type), args.len())
    }
}

/// Function name to overloads. Names are case-insensitive.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<Overload>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry with every builtin function.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        builtin::register_all(&mut r);
        r
    }

    pub fn register(&mut self, name: &str, overload: Overload) {
        self.functions
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(overload);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_lowercase())
    }

    /// Sorted function names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn resolve(&self, name: &str, args: &[Type]) -> Result<(Overload, Type), BuildErrorKind> {
        let overloads = self
            .functions
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| BuildErrorKind::UnknownFunction(name.to_string()))?;

        overloads
            .iter()
            .find_map(|o| o.result_for(args).map(|t| (*o, t)))
            .ok_or_else(|| BuildErrorKind::FunctionCast {
                name: name.to_string(),
                args: describe_types(args),
            })
    }
}

enum Op {
    Eager(Overload, EagerFn),
    Lazy(LazyFn),
    Patterns(Quantifier, Vec<Regex>),
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Eager(o, _) => f.debug_tuple("Eager").field(&o.params).finish(),
            Op::Lazy(_) => f.write_str("Lazy"),
            Op::Patterns(q, res) => f
                .debug_tuple("Patterns")
                .field(q)
                .field(&res.iter().map(Regex::as_str).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Resolved call of a registered function.
#[derive(Debug)]
pub struct FunctionCall {
    name: String,
    args: Vec<Expression>,
    result: Type,
    op: Op,
}

impl FunctionCall {
    pub(crate) fn new(
        registry: &FunctionRegistry,
        name: &str,
        args: Vec<Expression>,
    ) -> Result<Self, BuildError> {
        let types: Vec<Type> = args.iter().map(Expression::result_type).collect();
        let (overload, result) = registry
            .resolve(name, &types)
            .map_err(|e| BuildError::new(e).bind(name.to_string()))?;

        let op = match overload.imp {
            Implementation::Eager(f) => Op::Eager(overload, f),
            Implementation::Lazy(f) => Op::Lazy(f),
            Implementation::Pattern(m) => {
                Op::Patterns(m.quantifier, compile_patterns(name, &args, m.syntax)?)
            }
        };

        Ok(Self {
            name: name.to_ascii_lowercase(),
            args,
            result,
            op,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn result_type(&self) -> Type {
        self.result
    }

    pub fn calculate(&self, ctx: &Context) -> Result<Value, EvalError> {
        self.dispatch(ctx).map_err(|e| e.bind(self.name.clone()))
    }

    fn dispatch(&self, ctx: &Context) -> Result<Value, EvalError> {
        match &self.op {
            Op::Lazy(f) => f(&self.args, ctx),
            Op::Eager(o, f) => {
                let values = self.arguments(ctx)?;
                if !o.accepts_values(&values) {
                    let types: Vec<Type> = values.iter().map(Value::value_type).collect();
                    return Err(EvalErrorKind::FunctionCast {
                        name: self.name.clone(),
                        args: describe_types(&types),
                    }
                    .into());
                }
                f(&values)
            }
            Op::Patterns(quantifier, patterns) => {
                let Some(subject) = self.args.get(1) else {
                    return Err(EvalErrorKind::External("missing match subject".into()).into());
                };
                let v = subject
                    .calculate(ctx)
                    .map_err(|e| e.bind("argument #1"))?;
                let subjects: Vec<&str> = match &v {
                    Value::SetOfStrings(set) => set.iter().map(String::as_str).collect(),
                    Value::ListOfStrings(list) => list.iter().map(String::as_str).collect(),
                    other => vec![other.as_str()?],
                };

                let mut pairs = patterns
                    .iter()
                    .flat_map(|re| subjects.iter().map(move |s| re.is_match(s)));
                let matched = match quantifier {
                    Quantifier::Any => pairs.any(|m| m),
                    Quantifier::All => pairs.all(|m| m),
                };
                Ok(Value::Boolean(matched))
            }
        }
    }

    fn arguments(&self, ctx: &Context) -> Result<Vec<Value>, EvalError> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, a)| a.calculate(ctx).map_err(|e| e.bind(format!("argument #{i}"))))
            .collect()
    }
}

fn compile_patterns(
    name: &str,
    args: &[Expression],
    syntax: PatternSyntax,
) -> Result<Vec<Regex>, BuildError> {
    let sources: Vec<&String> = match args.first() {
        Some(Expression::Immediate(Value::String(p))) => vec![p],
        Some(Expression::Immediate(Value::SetOfStrings(set))) => set.iter().collect(),
        Some(Expression::Immediate(Value::ListOfStrings(list))) => list.iter().collect(),
        _ => {
            return Err(BuildError::new(BuildErrorKind::PatternNotImmediate(
                name.to_string(),
            )))
        }
    };

    sources
        .into_iter()
        .map(|p| compile_one(p, syntax).map_err(|e| BuildError::new(e).bind(name.to_string())))
        .collect()
}

fn compile_one(pattern: &str, syntax: PatternSyntax) -> Result<Regex, BuildErrorKind> {
    let source = match syntax {
        PatternSyntax::Regex => pattern.to_string(),
        PatternSyntax::Wildcard => wildcard_to_regex(pattern)
            .ok_or_else(|| BuildErrorKind::InvalidWildcard(pattern.to_string()))?,
    };
    Regex::new(&source).map_err(|e| BuildErrorKind::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Anchored regular expression equivalent to a wildcard pattern. `None` for
/// a pattern ending in a lone escape.
fn wildcard_to_regex(pattern: &str) -> Option<String> {
    let mut out = String::from("(?s)^");
    let mut literal = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let wildcard = match c {
            '\\' => {
                literal.push(chars.next()?);
                continue;
            }
            '*' => ".*",
            '?' => ".",
            _ => {
                literal.push(c);
                continue;
            }
        };
        out.push_str(&regex::escape(&literal));
        literal.clear();
        out.push_str(wildcard);
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    Some(out)
}
