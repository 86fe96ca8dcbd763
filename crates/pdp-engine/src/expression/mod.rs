//! Expressions.
//!
//! An expression is an attribute designator, an immediate value, a content
//! selector or a function call. Result types are fixed when the expression
//! is built, so evaluation only fails on data (missing attributes, bad
//! arithmetic, missing content), never on shape.

mod builtin;
pub mod function;
pub mod selector;

use std::sync::Arc;

use pdp_core::{EvalError, Type, Value};

use crate::attribute::Attribute;
use crate::context::Context;

pub use function::{
    FunctionCall, FunctionRegistry, Implementation, Matcher, Overload, Params, PatternSyntax,
    Quantifier, Returns,
};
pub use selector::{Selector, SelectorOptions};

#[derive(Debug, Clone)]
pub enum Expression {
    Designator(Attribute),
    Immediate(Value),
    Selector(Arc<Selector>),
    Call(Arc<FunctionCall>),
}

impl Expression {
    pub fn result_type(&self) -> Type {
        match self {
            Expression::Designator(a) => a.ty(),
            Expression::Immediate(v) => v.value_type(),
            Expression::Selector(s) => s.result_type(),
            Expression::Call(c) => c.result_type(),
        }
    }

    pub fn calculate(&self, ctx: &Context) -> Result<Value, EvalError> {
        match self {
            Expression::Designator(a) => ctx.get(a).cloned(),
            Expression::Immediate(v) => Ok(v.clone()),
            Expression::Selector(s) => s.calculate(ctx),
            Expression::Call(c) => c.calculate(ctx),
        }
    }

    /// Immediate values and selectors don't depend on request attributes
    /// directly and may stand on the constant side of a match.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Immediate(_) | Expression::Selector(_))
    }

    pub fn is_designator(&self) -> bool {
        matches!(self, Expression::Designator(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Expression::Designator(a) => a.describe(),
            Expression::Immediate(v) => v.describe(),
            Expression::Selector(s) => s.describe(),
            Expression::Call(c) => c.name().to_string(),
        }
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::Immediate(v)
    }
}

impl From<Attribute> for Expression {
    fn from(a: Attribute) -> Self {
        Expression::Designator(a)
    }
}
