//! Rules.

use pdp_core::EvalError;

use crate::attribute::{AttributeAssignmentExpression, Obligations};
use crate::context::Context;
use crate::effect::{Decision, Effect, Response};
use crate::expression::Expression;
use crate::target::Target;

/// Target, optional boolean condition, effect and obligations.
///
/// Built through [`crate::BuildContext::new_rule`], which checks that the
/// condition is boolean and the effect is Permit or Deny.
#[derive(Debug)]
pub struct Rule {
    id: Option<String>,
    target: Target,
    condition: Option<Expression>,
    effect: Effect,
    obligations: Obligations,
}

impl Rule {
    pub(crate) fn new(
        id: Option<String>,
        target: Target,
        condition: Option<Expression>,
        effect: Effect,
        obligations: Vec<AttributeAssignmentExpression>,
    ) -> Self {
        Self {
            id,
            target,
            condition,
            effect,
            obligations: obligations.into(),
        }
    }

    /// `None` for hidden rules.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) => format!("rule {id:?}"),
            None => "hidden rule".to_string(),
        }
    }

    pub fn obligations(&self) -> &[AttributeAssignmentExpression] {
        &self.obligations
    }

    /// Evaluates the rule as a root, obligations included.
    pub fn calculate(&self, ctx: &Context) -> Response {
        self.decide(ctx).resolve(ctx)
    }

    /// Effect of the rule. Obligations are left for the caller to resolve.
    pub fn decide(&self, ctx: &Context) -> Decision {
        match self.evaluate(ctx) {
            Ok(d) => d,
            Err(e) => Decision::indeterminate(self.effect, e.bind(self.describe())),
        }
    }

    fn evaluate(&self, ctx: &Context) -> Result<Decision, EvalError> {
        if !self.target.calculate(ctx)? {
            return Ok(Decision::not_applicable());
        }

        if let Some(c) = &self.condition {
            let ok = c
                .calculate(ctx)
                .and_then(|v| v.as_bool())
                .map_err(|e| e.bind("condition"))?;
            if !ok {
                return Ok(Decision::not_applicable());
            }
        }

        let mut d = Decision::new(self.effect);
        if !self.obligations.is_empty() {
            d.obligations.push(self.obligations.clone());
        }
        Ok(d)
    }
}
