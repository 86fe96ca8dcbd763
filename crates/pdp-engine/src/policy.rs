//! Policies and policy sets.
//!
//! Both are immutable once built. Updates go through [`Evaluable::append`]
//! and [`Evaluable::delete`], which return a patched copy sharing every
//! untouched subtree with the original.

use std::fmt;
use std::sync::Arc;

use pdp_core::{BuildErrorKind, EvalError, UpdateError, UpdateErrorKind};

use crate::algorithm::{Combinable, CombiningAlg};
use crate::attribute::{AttributeAssignmentExpression, Obligations};
use crate::context::Context;
use crate::effect::{Decision, Effect, Response};
use crate::rule::Rule;
use crate::target::Target;

/// Node of the policy tree that can be evaluated on its own.
pub trait Evaluable: Send + Sync + fmt::Debug {
    /// `None` for hidden nodes.
    fn id(&self) -> Option<&str>;

    /// "policy" or "policy set".
    fn kind(&self) -> &'static str;

    /// Nesting depth, 1 for a policy.
    fn depth(&self) -> usize;

    /// Combined effect of the node. Obligations of the winning path stay
    /// unevaluated.
    fn decide(&self, ctx: &Context) -> Decision;

    /// Evaluates the node as a root, obligations included.
    fn calculate(&self, ctx: &Context) -> Response {
        self.decide(ctx).resolve(ctx)
    }

    /// Copy with `entity` added (or replacing a same-id child) under the
    /// node at `path`. `path` is relative to this node.
    fn append(&self, path: &[&str], entity: &Entity) -> Result<Arc<dyn Evaluable>, UpdateError>;

    /// Copy without the node at `path`. `path` is relative to this node.
    fn delete(&self, path: &[&str]) -> Result<Arc<dyn Evaluable>, UpdateError>;

    fn describe(&self) -> String {
        match self.id() {
            Some(id) => format!("{} {id:?}", self.kind()),
            None => format!("hidden {}", self.kind()),
        }
    }
}

/// Payload of a policy update command.
#[derive(Debug, Clone)]
pub enum Entity {
    Evaluable(Arc<dyn Evaluable>),
    Rule(Arc<Rule>),
}

impl Entity {
    pub fn id(&self) -> Option<&str> {
        match self {
            Entity::Evaluable(e) => e.id(),
            Entity::Rule(r) => r.id(),
        }
    }
}

impl From<Arc<dyn Evaluable>> for Entity {
    fn from(e: Arc<dyn Evaluable>) -> Self {
        Entity::Evaluable(e)
    }
}

impl From<Rule> for Entity {
    fn from(r: Rule) -> Self {
        Entity::Rule(Arc::new(r))
    }
}

impl From<Policy> for Entity {
    fn from(p: Policy) -> Self {
        Entity::Evaluable(Arc::new(p))
    }
}

impl From<PolicySet> for Entity {
    fn from(p: PolicySet) -> Self {
        Entity::Evaluable(Arc::new(p))
    }
}

/// Target, rules, rule-combining algorithm and obligations.
#[derive(Debug, Clone)]
pub struct Policy {
    id: Option<String>,
    target: Target,
    rules: Vec<Arc<Rule>>,
    alg: CombiningAlg,
    obligations: Obligations,
}

impl Policy {
    pub(crate) fn new(
        id: Option<String>,
        target: Target,
        rules: Vec<Arc<Rule>>,
        alg: CombiningAlg,
        obligations: Vec<AttributeAssignmentExpression>,
    ) -> Self {
        Self {
            id,
            target,
            rules,
            alg,
            obligations: obligations.into(),
        }
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn algorithm(&self) -> &CombiningAlg {
        &self.alg
    }

    fn with_rules(&self, rules: Vec<Arc<Rule>>) -> Result<Arc<dyn Evaluable>, UpdateError> {
        let alg = self.alg.rebind(&child_ids(&rules)).map_err(update_error)?;
        Ok(Arc::new(Policy {
            id: self.id.clone(),
            target: self.target.clone(),
            rules,
            alg,
            obligations: self.obligations.clone(),
        }))
    }
}

impl Evaluable for Policy {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn kind(&self) -> &'static str {
        "policy"
    }

    fn depth(&self) -> usize {
        1
    }

    fn decide(&self, ctx: &Context) -> Decision {
        combine(&self.target, &self.rules, &self.alg, &self.obligations, ctx)
            .bind_status(self.describe())
    }

    fn append(&self, path: &[&str], entity: &Entity) -> Result<Arc<dyn Evaluable>, UpdateError> {
        if self.id.is_none() {
            return Err(UpdateErrorKind::HiddenModification("policy").into());
        }
        if let Some(first) = path.first() {
            return Err(UpdateError::new(UpdateErrorKind::PathTooLong((*first).to_string()))
                .bind(self.describe()));
        }

        let rule = match entity {
            Entity::Rule(r) => r.clone(),
            Entity::Evaluable(_) => {
                return Err(UpdateError::new(UpdateErrorKind::InvalidEntity("rule"))
                    .bind(self.describe()))
            }
        };
        if rule.id().is_none() {
            return Err(UpdateError::new(UpdateErrorKind::HiddenAppend("rule")).bind(self.describe()));
        }

        self.with_rules(upsert(&self.rules, rule))
            .map_err(|e| e.bind(self.describe()))
    }

    fn delete(&self, path: &[&str]) -> Result<Arc<dyn Evaluable>, UpdateError> {
        if self.id.is_none() {
            return Err(UpdateErrorKind::HiddenModification("policy").into());
        }
        let (id, rest) = path
            .split_first()
            .ok_or_else(|| UpdateError::new(UpdateErrorKind::PathTooShort).bind(self.describe()))?;
        if let Some(next) = rest.first() {
            return Err(UpdateError::new(UpdateErrorKind::PathTooLong((*next).to_string()))
                .bind(self.describe()));
        }

        let rules = remove(&self.rules, id).map_err(|e| e.bind(self.describe()))?;
        self.with_rules(rules).map_err(|e| e.bind(self.describe()))
    }
}

/// Target, child policies or policy sets, policy-combining algorithm and
/// obligations.
#[derive(Debug, Clone)]
pub struct PolicySet {
    id: Option<String>,
    target: Target,
    policies: Vec<Arc<dyn Evaluable>>,
    alg: CombiningAlg,
    obligations: Obligations,
    depth: usize,
}

impl PolicySet {
    pub(crate) fn new(
        id: Option<String>,
        target: Target,
        policies: Vec<Arc<dyn Evaluable>>,
        alg: CombiningAlg,
        obligations: Obligations,
    ) -> Self {
        let depth = max_depth(&policies);
        Self {
            id,
            target,
            policies,
            alg,
            obligations,
            depth,
        }
    }

    pub fn policies(&self) -> &[Arc<dyn Evaluable>] {
        &self.policies
    }

    pub fn algorithm(&self) -> &CombiningAlg {
        &self.alg
    }

    fn with_policies(
        &self,
        policies: Vec<Arc<dyn Evaluable>>,
    ) -> Result<Arc<dyn Evaluable>, UpdateError> {
        let alg = self.alg.rebind(&child_ids(&policies)).map_err(update_error)?;
        Ok(Arc::new(PolicySet::new(
            self.id.clone(),
            self.target.clone(),
            policies,
            alg,
            self.obligations.clone(),
        )))
    }

    fn child(&self, id: &str) -> Result<(usize, &Arc<dyn Evaluable>), UpdateError> {
        self.policies
            .iter()
            .enumerate()
            .find(|(_, p)| p.id() == Some(id))
            .ok_or_else(|| UpdateErrorKind::MissingChild(id.to_string()).into())
    }
}

impl Evaluable for PolicySet {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn kind(&self) -> &'static str {
        "policy set"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn decide(&self, ctx: &Context) -> Decision {
        combine(&self.target, &self.policies, &self.alg, &self.obligations, ctx)
            .bind_status(self.describe())
    }

    fn append(&self, path: &[&str], entity: &Entity) -> Result<Arc<dyn Evaluable>, UpdateError> {
        if self.id.is_none() {
            return Err(UpdateErrorKind::HiddenModification("policy set").into());
        }

        let policies = match path.split_first() {
            None => {
                let e = match entity {
                    Entity::Evaluable(e) => e.clone(),
                    Entity::Rule(_) => {
                        return Err(UpdateError::new(UpdateErrorKind::InvalidEntity(
                            "policy or policy set",
                        ))
                        .bind(self.describe()))
                    }
                };
                if e.id().is_none() {
                    return Err(UpdateError::new(UpdateErrorKind::HiddenAppend(e.kind()))
                        .bind(self.describe()));
                }
                upsert(&self.policies, e)
            }
            Some((id, rest)) => {
                let (i, child) = self.child(id).map_err(|e| e.bind(self.describe()))?;
                let patched = child.append(rest, entity).map_err(|e| e.bind(self.describe()))?;
                let mut policies = self.policies.clone();
                policies[i] = patched;
                policies
            }
        };

        self.with_policies(policies).map_err(|e| e.bind(self.describe()))
    }

    fn delete(&self, path: &[&str]) -> Result<Arc<dyn Evaluable>, UpdateError> {
        if self.id.is_none() {
            return Err(UpdateErrorKind::HiddenModification("policy set").into());
        }

        let policies = match path.split_first() {
            None => {
                return Err(UpdateError::new(UpdateErrorKind::PathTooShort).bind(self.describe()))
            }
            Some((id, [])) => remove(&self.policies, id).map_err(|e| e.bind(self.describe()))?,
            Some((id, rest)) => {
                let (i, child) = self.child(id).map_err(|e| e.bind(self.describe()))?;
                let patched = child.delete(rest).map_err(|e| e.bind(self.describe()))?;
                let mut policies = self.policies.clone();
                policies[i] = patched;
                policies
            }
        };

        self.with_policies(policies).map_err(|e| e.bind(self.describe()))
    }
}

/// Shared evaluation of policies and policy sets.
///
/// Own obligations join the decision only when it is Permit or Deny. A
/// target error still runs the algorithm to learn the would-be effect and
/// reports it as the matching Indeterminate variant.
fn combine<C: Combinable>(
    target: &Target,
    children: &[C],
    alg: &CombiningAlg,
    obligations: &Obligations,
    ctx: &Context,
) -> Decision {
    match target.calculate(ctx) {
        Ok(false) => Decision::not_applicable(),
        Ok(true) => {
            let mut d = alg.execute(children, ctx);
            if d.effect.is_decisive() && !obligations.is_empty() {
                d.obligations.push(obligations.clone());
            }
            d
        }
        Err(e) => {
            let d = alg.execute(children, ctx);
            let effect = match d.effect {
                Effect::Deny | Effect::IndeterminateD => Effect::IndeterminateD,
                Effect::Permit | Effect::IndeterminateP => Effect::IndeterminateP,
                Effect::NotApplicable => Effect::Indeterminate,
                Effect::Indeterminate | Effect::IndeterminateDP => Effect::IndeterminateDP,
            };
            let status = match d.status {
                Some(s) => EvalError::multi(vec![e, s]),
                None => e,
            };
            Decision::indeterminate(effect, status)
        }
    }
}

pub(crate) fn child_ids<C: Combinable>(children: &[C]) -> Vec<Option<&str>> {
    children.iter().map(|c| c.child_id()).collect()
}

/// Fails on the first id shared by two visible children.
pub(crate) fn check_unique_ids(ids: &[Option<&str>]) -> Result<(), BuildErrorKind> {
    let mut seen = std::collections::HashSet::new();
    for id in ids.iter().flatten() {
        if !seen.insert(*id) {
            return Err(BuildErrorKind::DuplicateId((*id).to_string()));
        }
    }
    Ok(())
}

fn max_depth(policies: &[Arc<dyn Evaluable>]) -> usize {
    policies.iter().map(|p| p.depth()).max().unwrap_or(0) + 1
}

fn upsert<C: Combinable + Clone>(children: &[C], child: C) -> Vec<C> {
    let mut out = children.to_vec();
    let pos = child
        .child_id()
        .and_then(|id| out.iter().position(|c| c.child_id() == Some(id)));
    match pos {
        Some(i) => out[i] = child,
        None => out.push(child),
    }
    out
}

fn remove<C: Combinable + Clone>(children: &[C], id: &str) -> Result<Vec<C>, UpdateError> {
    let pos = children
        .iter()
        .position(|c| c.child_id() == Some(id))
        .ok_or_else(|| UpdateError::new(UpdateErrorKind::MissingChild(id.to_string())))?;
    let mut out = children.to_vec();
    out.remove(pos);
    Ok(out)
}

fn update_error(e: BuildErrorKind) -> UpdateError {
    UpdateError::new(UpdateErrorKind::Build(e))
}
