//! Content-driven dispatch.
//!
//! The argument picks children by id. String picks one child, Set of
//! Strings picks every member in lexicographic order, List of Strings picks
//! in declared order. Several picks are folded with the sub-algorithm.
//!
//! Nothing picked, or an argument whose content lookup found no value, goes
//! to the `default` child. Other argument errors go to the `error` child.
//! Rule mappers also use `default` when the sub-algorithm over the picked
//! rules is NotApplicable.

use std::collections::HashMap;

use pdp_core::{BuildErrorKind, EvalError, EvalErrorKind, Type, Value};
use tracing::debug;

use super::{BasicAlg, Combinable};
use crate::context::Context;
use crate::effect::{Decision, Effect};
use crate::expression::Expression;

/// Parameters of the `mapper` algorithm.
#[derive(Debug, Clone)]
pub struct MapperParams {
    pub argument: Expression,
    /// Child used when nothing matches or the argument finds no value.
    pub default: Option<String>,
    /// Child used when the argument can't be evaluated.
    pub error: Option<String>,
    /// Folds several matches; the build context default when unset.
    pub sub_algorithm: Option<String>,
}

impl MapperParams {
    pub fn new(argument: Expression) -> Self {
        Self {
            argument,
            default: None,
            error: None,
            sub_algorithm: None,
        }
    }

    pub fn with_default(mut self, id: impl Into<String>) -> Self {
        self.default = Some(id.into());
        self
    }

    pub fn with_error(mut self, id: impl Into<String>) -> Self {
        self.error = Some(id.into());
        self
    }

    pub fn with_sub_algorithm(mut self, name: impl Into<String>) -> Self {
        self.sub_algorithm = Some(name.into());
        self
    }
}

#[derive(Debug)]
pub struct MapperAlg {
    argument: Expression,
    default: Option<String>,
    error: Option<String>,
    sub: BasicAlg,
    index: HashMap<String, usize>,
    default_idx: Option<usize>,
    error_idx: Option<usize>,
}

impl MapperAlg {
    pub(crate) fn new(
        params: MapperParams,
        sub: BasicAlg,
        ids: &[Option<&str>],
    ) -> Result<Self, BuildErrorKind> {
        let t = params.argument.result_type();
        if !matches!(t, Type::String | Type::SetOfStrings | Type::ListOfStrings) {
            return Err(BuildErrorKind::MapperArgumentType(t));
        }

        let mut alg = Self {
            argument: params.argument,
            default: params.default,
            error: params.error,
            sub,
            index: HashMap::new(),
            default_idx: None,
            error_idx: None,
        };
        alg.bind_ids(ids)?;
        Ok(alg)
    }

    /// Copy of the mapper checked against a new set of siblings.
    pub(crate) fn rebind(&self, ids: &[Option<&str>]) -> Result<Self, BuildErrorKind> {
        let mut alg = Self {
            argument: self.argument.clone(),
            default: self.default.clone(),
            error: self.error.clone(),
            sub: self.sub,
            index: HashMap::new(),
            default_idx: None,
            error_idx: None,
        };
        alg.bind_ids(ids)?;
        Ok(alg)
    }

    fn bind_ids(&mut self, ids: &[Option<&str>]) -> Result<(), BuildErrorKind> {
        for (i, id) in ids.iter().enumerate() {
            if let Some(id) = id {
                self.index.entry((*id).to_string()).or_insert(i);
            }
        }

        let resolve = |role: &'static str, id: &Option<String>| -> Result<Option<usize>, BuildErrorKind> {
            match id {
                None => Ok(None),
                Some(id) => match self.index.get(id) {
                    Some(i) => Ok(Some(*i)),
                    None => Err(BuildErrorKind::DanglingSibling {
                        role,
                        id: id.clone(),
                    }),
                },
            }
        };
        let default_idx = resolve("default", &self.default)?;
        let error_idx = resolve("error", &self.error)?;

        self.default_idx = default_idx;
        self.error_idx = error_idx;
        Ok(())
    }

    pub fn argument(&self) -> &Expression {
        &self.argument
    }

    pub fn sub_algorithm(&self) -> BasicAlg {
        self.sub
    }

    pub fn execute<C: Combinable>(&self, children: &[C], ctx: &Context) -> Decision {
        let arg = match self.argument.calculate(ctx) {
            Ok(v) => v,
            Err(e) if e.is_missing_value() && self.default_idx.is_some() => {
                debug!(default = ?self.default, status = %e, "mapper argument has no value");
                return self.on_miss(children, ctx);
            }
            Err(e) => return self.on_error(children, ctx, e),
        };

        match arg {
            Value::String(s) => match self.index.get(&s).and_then(|i| children.get(*i)) {
                Some(c) => c.child_decision(ctx),
                None => self.on_miss(children, ctx),
            },
            Value::SetOfStrings(set) => self.select(children, ctx, set.iter()),
            Value::ListOfStrings(list) => self.select(children, ctx, list.iter()),
            other => {
                let e = EvalError::new(EvalErrorKind::MapperArgumentType(other.value_type()));
                self.on_error(children, ctx, e)
            }
        }
    }

    fn select<'a, C: Combinable>(
        &self,
        children: &[C],
        ctx: &Context,
        keys: impl Iterator<Item = &'a String>,
    ) -> Decision {
        let selected: Vec<&C> = keys
            .filter_map(|k| self.index.get(k))
            .filter_map(|i| children.get(*i))
            .collect();
        if selected.is_empty() {
            return self.on_miss(children, ctx);
        }

        let d = self.sub.execute(&selected, ctx);
        if C::RULES && d.effect == Effect::NotApplicable {
            return self.on_miss(children, ctx);
        }
        d
    }

    fn on_miss<C: Combinable>(&self, children: &[C], ctx: &Context) -> Decision {
        match self.default_idx.and_then(|i| children.get(i)) {
            Some(c) => {
                debug!(default = ?self.default, "mapper falls back to default child");
                c.child_decision(ctx)
            }
            None => Decision::not_applicable(),
        }
    }

    fn on_error<C: Combinable>(&self, children: &[C], ctx: &Context, err: EvalError) -> Decision {
        if let Some(c) = self.error_idx.and_then(|i| children.get(i)) {
            debug!(error = ?self.error, status = %err, "mapper falls back to error child");
            return c.child_decision(ctx);
        }
        Decision::indeterminate(fold_indeterminate(children), err.bind("mapper"))
    }
}

/// Would-be effect of a mapper that failed before picking a child.
fn fold_indeterminate<C: Combinable>(children: &[C]) -> Effect {
    let (mut d, mut p) = (false, false);
    for c in children {
        match c.indeterminate_effect() {
            Effect::IndeterminateD => d = true,
            Effect::IndeterminateP => p = true,
            Effect::IndeterminateDP => {
                d = true;
                p = true;
            }
            _ => {}
        }
    }
    match (d, p) {
        (true, true) => Effect::IndeterminateDP,
        (true, false) => Effect::IndeterminateD,
        (false, true) => Effect::IndeterminateP,
        (false, false) => Effect::Indeterminate,
    }
}
