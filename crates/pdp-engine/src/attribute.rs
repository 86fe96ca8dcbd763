//! Attributes, assignments and obligation expressions.

use std::fmt;
use std::sync::Arc;

use pdp_core::{EvalError, Type, Value};

use crate::context::Context;
use crate::expression::Expression;

/// Named, typed request attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    id: String,
    ty: Type,
}

impl Attribute {
    pub fn new(id: impl Into<String>, ty: Type) -> Self {
        Self { id: id.into(), ty }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn describe(&self) -> String {
        format!("attr({}.{})", self.id, self.ty.key())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Attribute bound to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAssignment {
    attribute: Attribute,
    value: Value,
}

impl AttributeAssignment {
    pub fn new(attribute: Attribute, value: Value) -> Self {
        Self { attribute, value }
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn id(&self) -> &str {
        self.attribute.id()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// `(id, type key, canonical text)`.
    pub fn serialize(&self) -> (String, String, String) {
        (
            self.attribute.id.clone(),
            self.attribute.ty.key().to_string(),
            self.value.serialize(),
        )
    }
}

/// Obligation: attribute whose value is computed from an expression when
/// the owning node wins. Types are checked at construction.
#[derive(Debug, Clone)]
pub struct AttributeAssignmentExpression {
    attribute: Attribute,
    expr: Expression,
}

impl AttributeAssignmentExpression {
    pub(crate) fn new(attribute: Attribute, expr: Expression) -> Self {
        Self { attribute, expr }
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn calculate(&self, ctx: &Context) -> Result<AttributeAssignment, EvalError> {
        let value = self
            .expr
            .calculate(ctx)
            .map_err(|e| e.bind(format!("assignment to {:?}", self.attribute.id)))?;
        Ok(AttributeAssignment::new(self.attribute.clone(), value))
    }
}

/// Obligations of one node, shared between the node and the decisions it
/// takes part in.
pub type Obligations = Arc<[AttributeAssignmentExpression]>;
