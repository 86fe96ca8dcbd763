//! Combining algorithms.
//!
//! An algorithm reduces the responses of an ordered list of children (rules
//! of a policy, or policies of a policy set) to one response. Algorithms
//! are looked up by case-insensitive name in an [`AlgorithmRegistry`] owned
//! by the build context; there is no global registry.

mod mapper;

use std::collections::HashMap;
use std::sync::Arc;

use pdp_core::{BuildErrorKind, EvalError};

use crate::context::Context;
use crate::effect::{Decision, Effect};
use crate::policy::Evaluable;
use crate::rule::Rule;

pub use mapper::{MapperAlg, MapperParams};

/// Child of a combining algorithm.
pub trait Combinable {
    /// True for rules, false for policies and policy sets.
    const RULES: bool;

    /// `None` for hidden children.
    fn child_id(&self) -> Option<&str>;
    /// Decision of the child with its obligations still unevaluated.
    fn child_decision(&self, ctx: &Context) -> Decision;
    /// Indeterminate effect the child stands for when it can't be evaluated.
    fn indeterminate_effect(&self) -> Effect;
}

impl Combinable for Arc<Rule> {
    const RULES: bool = true;

    fn child_id(&self) -> Option<&str> {
        self.id()
    }

    fn child_decision(&self, ctx: &Context) -> Decision {
        self.decide(ctx)
    }

    fn indeterminate_effect(&self) -> Effect {
        self.effect().as_indeterminate()
    }
}

impl Combinable for Arc<dyn Evaluable> {
    const RULES: bool = false;

    fn child_id(&self) -> Option<&str> {
        self.id()
    }

    fn child_decision(&self, ctx: &Context) -> Decision {
        self.decide(ctx)
    }

    fn indeterminate_effect(&self) -> Effect {
        Effect::Indeterminate
    }
}

impl<C: Combinable> Combinable for &C {
    const RULES: bool = C::RULES;

    fn child_id(&self) -> Option<&str> {
        (**self).child_id()
    }

    fn child_decision(&self, ctx: &Context) -> Decision {
        (**self).child_decision(ctx)
    }

    fn indeterminate_effect(&self) -> Effect {
        (**self).indeterminate_effect()
    }
}

/// Algorithms without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicAlg {
    FirstApplicable,
    DenyOverrides,
    PermitOverrides,
}

impl BasicAlg {
    pub fn name(self) -> &'static str {
        match self {
            BasicAlg::FirstApplicable => "firstapplicableeffect",
            BasicAlg::DenyOverrides => "denyoverrides",
            BasicAlg::PermitOverrides => "permitoverrides",
        }
    }

    pub fn execute<C: Combinable>(self, children: &[C], ctx: &Context) -> Decision {
        match self {
            BasicAlg::FirstApplicable => first_applicable(children, ctx),
            BasicAlg::DenyOverrides => overrides(children, ctx, Effect::Deny, Effect::Permit)
                .bind_status("deny overrides"),
            BasicAlg::PermitOverrides => overrides(children, ctx, Effect::Permit, Effect::Deny)
                .bind_status("permit overrides"),
        }
    }
}

/// First decision other than NotApplicable, Indeterminate included.
fn first_applicable<C: Combinable>(children: &[C], ctx: &Context) -> Decision {
    for c in children {
        let r = c.child_decision(ctx);
        if r.effect != Effect::NotApplicable {
            return r;
        }
    }
    Decision::not_applicable()
}

/// `strong` wins as soon as any child returns it. Obligations of every
/// `weak` child are collected in order in case `weak` ends up winning; they
/// are evaluated only after the final effect is known.
fn overrides<C: Combinable>(children: &[C], ctx: &Context, strong: Effect, weak: Effect) -> Decision {
    let ind_strong = strong.as_indeterminate();
    let ind_weak = weak.as_indeterminate();

    let mut errs: Vec<EvalError> = Vec::new();
    let (mut n_strong, mut n_weak, mut n_both) = (0usize, 0usize, 0usize);
    let mut weak_count = 0usize;
    let mut weak_obligations = Vec::new();

    for c in children {
        let r = c.child_decision(ctx);
        match r.effect {
            e if e == strong => return r,
            e if e == weak => {
                weak_count += 1;
                weak_obligations.extend(r.obligations);
            }
            Effect::NotApplicable => {}
            e => {
                if e == ind_strong {
                    n_strong += 1;
                } else if e == ind_weak {
                    n_weak += 1;
                } else {
                    n_both += 1;
                }
                errs.extend(r.status);
            }
        }
    }

    if n_both > 0 || (n_strong > 0 && (n_weak > 0 || weak_count > 0)) {
        return Decision::indeterminate(Effect::IndeterminateDP, EvalError::multi(errs));
    }
    if n_strong > 0 {
        return Decision::indeterminate(ind_strong, EvalError::multi(errs));
    }
    if weak_count > 0 {
        let mut d = Decision::new(weak);
        d.obligations = weak_obligations;
        return d;
    }
    if n_weak > 0 {
        return Decision::indeterminate(ind_weak, EvalError::multi(errs));
    }
    Decision::not_applicable()
}

/// Configured combining algorithm of a policy or policy set.
#[derive(Debug, Clone)]
pub enum CombiningAlg {
    Basic(BasicAlg),
    Mapper(Arc<MapperAlg>),
}

impl CombiningAlg {
    pub fn name(&self) -> &'static str {
        match self {
            CombiningAlg::Basic(b) => b.name(),
            CombiningAlg::Mapper(_) => "mapper",
        }
    }

    pub fn execute<C: Combinable>(&self, children: &[C], ctx: &Context) -> Decision {
        match self {
            CombiningAlg::Basic(b) => b.execute(children, ctx),
            CombiningAlg::Mapper(m) => m.execute(children, ctx),
        }
    }

    /// Same algorithm revalidated against a new list of sibling ids.
    pub(crate) fn rebind(&self, ids: &[Option<&str>]) -> Result<CombiningAlg, BuildErrorKind> {
        match self {
            CombiningAlg::Basic(b) => Ok(CombiningAlg::Basic(*b)),
            CombiningAlg::Mapper(m) => Ok(CombiningAlg::Mapper(Arc::new(m.rebind(ids)?))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlgKind {
    Basic(BasicAlg),
    Mapper,
}

/// Case-insensitive algorithm names.
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
    algs: HashMap<String, AlgKind>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AlgorithmRegistry {
    /// `firstapplicableeffect`, `denyoverrides`, `permitoverrides`, `mapper`.
    pub fn builtin() -> Self {
        let mut algs = HashMap::new();
        for b in [
            BasicAlg::FirstApplicable,
            BasicAlg::DenyOverrides,
            BasicAlg::PermitOverrides,
        ] {
            algs.insert(b.name().to_string(), AlgKind::Basic(b));
        }
        algs.insert("mapper".to_string(), AlgKind::Mapper);
        Self { algs }
    }

    /// Registers `alias` for an already registered algorithm.
    pub fn register_alias(&mut self, alias: &str, name: &str) -> Result<(), BuildErrorKind> {
        let kind = self.kind(name)?;
        let key = alias.to_ascii_lowercase();
        if self.algs.contains_key(&key) {
            return Err(BuildErrorKind::DuplicateAlgorithm(alias.to_string()));
        }
        self.algs.insert(key, kind);
        Ok(())
    }

    fn kind(&self, name: &str) -> Result<AlgKind, BuildErrorKind> {
        self.algs
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| BuildErrorKind::UnknownAlgorithm(name.to_string()))
    }

    /// Parameterless algorithm usable as a mapper sub-algorithm.
    pub fn basic(&self, name: &str) -> Result<BasicAlg, BuildErrorKind> {
        match self.kind(name)? {
            AlgKind::Basic(b) => Ok(b),
            AlgKind::Mapper => Err(BuildErrorKind::NestedMapper),
        }
    }

    /// Builds algorithm `name` for children with ids `ids`.
    pub fn make(
        &self,
        name: &str,
        params: Option<MapperParams>,
        ids: &[Option<&str>],
        default_sub: BasicAlg,
    ) -> Result<CombiningAlg, BuildErrorKind> {
        match self.kind(name)? {
            AlgKind::Basic(b) => match params {
                None => Ok(CombiningAlg::Basic(b)),
                Some(_) => Err(BuildErrorKind::UnexpectedAlgorithmParams(name.to_string())),
            },
            AlgKind::Mapper => {
                let params = params.ok_or_else(|| BuildErrorKind::MissingAlgorithmParam {
                    alg: name.to_string(),
                    param: "argument",
                })?;
                let sub = match &params.sub_algorithm {
                    Some(s) => self.basic(s)?,
                    None => default_sub,
                };
                Ok(CombiningAlg::Mapper(Arc::new(MapperAlg::new(params, sub, ids)?)))
            }
        }
    }
}
