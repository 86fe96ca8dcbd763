//! Decision effects and responses.

use std::fmt;

use pdp_core::EvalError;

use crate::attribute::{AttributeAssignment, Obligations};
use crate::context::Context;

/// Decision lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Deny,
    Permit,
    NotApplicable,
    Indeterminate,
    IndeterminateD,
    IndeterminateP,
    IndeterminateDP,
}

impl Effect {
    pub fn name(self) -> &'static str {
        match self {
            Effect::Deny => "Deny",
            Effect::Permit => "Permit",
            Effect::NotApplicable => "NotApplicable",
            Effect::Indeterminate => "Indeterminate",
            Effect::IndeterminateD => "Indeterminate{D}",
            Effect::IndeterminateP => "Indeterminate{P}",
            Effect::IndeterminateDP => "Indeterminate{DP}",
        }
    }

    /// Rule effect by name ("permit" or "deny", any case).
    pub fn from_rule_effect_name(s: &str) -> Option<Effect> {
        if s.eq_ignore_ascii_case("permit") {
            Some(Effect::Permit)
        } else if s.eq_ignore_ascii_case("deny") {
            Some(Effect::Deny)
        } else {
            None
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(
            self,
            Effect::Indeterminate
                | Effect::IndeterminateD
                | Effect::IndeterminateP
                | Effect::IndeterminateDP
        )
    }

    /// Permit or Deny.
    pub fn is_decisive(self) -> bool {
        matches!(self, Effect::Permit | Effect::Deny)
    }

    /// Indeterminate variant for a failure that would otherwise have
    /// produced `self`.
    pub fn as_indeterminate(self) -> Effect {
        match self {
            Effect::Permit | Effect::IndeterminateP => Effect::IndeterminateP,
            Effect::Deny | Effect::IndeterminateD => Effect::IndeterminateD,
            Effect::IndeterminateDP => Effect::IndeterminateDP,
            Effect::NotApplicable | Effect::Indeterminate => Effect::Indeterminate,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of evaluating a rule, policy or policy set.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub effect: Effect,
    pub obligations: Vec<AttributeAssignment>,
    pub status: Option<EvalError>,
}

impl Response {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            obligations: Vec::new(),
            status: None,
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(Effect::NotApplicable)
    }

    pub fn indeterminate(effect: Effect, err: EvalError) -> Self {
        Self {
            effect: effect.as_indeterminate(),
            obligations: Vec::new(),
            status: Some(err),
        }
    }

    pub fn with_obligations(mut self, obligations: Vec<AttributeAssignment>) -> Self {
        self.obligations = obligations;
        self
    }

    pub(crate) fn bind_status(mut self, src: impl Into<String>) -> Self {
        if let Some(e) = self.status.take() {
            self.status = Some(e.bind(src));
        }
        self
    }

    /// Status text, "Ok" when there is no error.
    pub fn status_message(&self) -> String {
        match &self.status {
            Some(e) => e.to_string(),
            None => "Ok".to_string(),
        }
    }
}

/// Combined effect with the obligations of every node on the winning path
/// still unevaluated.
///
/// Combining algorithms work on decisions; obligations are computed once,
/// by [`Decision::resolve`], when the evaluated root has its final effect.
#[derive(Debug, Clone)]
pub struct Decision {
    pub effect: Effect,
    pub obligations: Vec<Obligations>,
    pub status: Option<EvalError>,
}

impl Decision {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            obligations: Vec::new(),
            status: None,
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(Effect::NotApplicable)
    }

    pub fn indeterminate(effect: Effect, err: EvalError) -> Self {
        Self {
            effect: effect.as_indeterminate(),
            obligations: Vec::new(),
            status: Some(err),
        }
    }

    pub(crate) fn bind_status(mut self, src: impl Into<String>) -> Self {
        if let Some(e) = self.status.take() {
            self.status = Some(e.bind(src));
        }
        self
    }

    /// Computes obligations in order.
    ///
    /// Any failing obligation turns Permit into Indeterminate{P} and Deny
    /// into Indeterminate{D}; the status lists every failure and no partial
    /// obligations are returned.
    pub fn resolve(self, ctx: &Context) -> Response {
        if !self.effect.is_decisive() {
            return Response {
                effect: self.effect,
                obligations: Vec::new(),
                status: self.status,
            };
        }

        let mut out = Vec::new();
        let mut errs = Vec::new();
        for o in self.obligations.iter().flat_map(|o| o.iter()) {
            match o.calculate(ctx) {
                Ok(a) => out.push(a),
                Err(e) => errs.push(e),
            }
        }
        if !errs.is_empty() {
            return Response::indeterminate(self.effect, EvalError::multi(errs).bind("obligations"));
        }
        Response::new(self.effect).with_obligations(out)
    }
}
