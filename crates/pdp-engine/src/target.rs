//! Targets: AND of OR of AND over two-operand match predicates.
//!
//! Evaluation short-circuits at every level. An error is returned as is
//! (bound to the level it passed through); callers turn it into an
//! Indeterminate result.

use std::sync::Arc;

use pdp_core::{BuildError, BuildErrorKind, EvalError, Type};

use crate::context::Context;
use crate::expression::{Expression, FunctionCall, FunctionRegistry};

/// Boolean function over one constant and one designator operand.
#[derive(Debug, Clone)]
pub struct Match {
    call: Arc<FunctionCall>,
}

impl Match {
    pub(crate) fn new(
        registry: &FunctionRegistry,
        name: &str,
        first: Expression,
        second: Expression,
    ) -> Result<Self, BuildError> {
        let shape_ok = (first.is_constant() && second.is_designator())
            || (first.is_designator() && second.is_constant());
        if !shape_ok {
            return Err(BuildError::new(BuildErrorKind::MatchOperands).bind("match"));
        }

        let call = FunctionCall::new(registry, name, vec![first, second])
            .map_err(|e| e.bind("match"))?;
        if call.result_type() != Type::Boolean {
            return Err(BuildError::new(BuildErrorKind::MatchResultType {
                name: name.to_string(),
                actual: call.result_type(),
            })
            .bind("match"));
        }

        Ok(Self {
            call: Arc::new(call),
        })
    }

    pub fn calculate(&self, ctx: &Context) -> Result<bool, EvalError> {
        self.call
            .calculate(ctx)
            .and_then(|v| v.as_bool())
            .map_err(|e| e.bind("match"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AllOf {
    matches: Vec<Match>,
}

impl AllOf {
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn push(&mut self, m: Match) {
        self.matches.push(m);
    }

    pub fn calculate(&self, ctx: &Context) -> Result<bool, EvalError> {
        for m in &self.matches {
            if !m.calculate(ctx).map_err(|e| e.bind("all"))? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnyOf {
    all: Vec<AllOf>,
}

impl AnyOf {
    pub fn new(all: Vec<AllOf>) -> Self {
        Self { all }
    }

    pub fn push(&mut self, a: AllOf) {
        self.all.push(a);
    }

    pub fn calculate(&self, ctx: &Context) -> Result<bool, EvalError> {
        for a in &self.all {
            if a.calculate(ctx).map_err(|e| e.bind("any"))? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Empty target matches everything.
#[derive(Debug, Clone, Default)]
pub struct Target {
    any: Vec<AnyOf>,
}

impl Target {
    pub fn new(any: Vec<AnyOf>) -> Self {
        Self { any }
    }

    pub fn push(&mut self, a: AnyOf) {
        self.any.push(a);
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }

    pub fn calculate(&self, ctx: &Context) -> Result<bool, EvalError> {
        for a in &self.any {
            if !a.calculate(ctx).map_err(|e| e.bind("target"))? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
