//! Construction surface.
//!
//! Deserializers build policy trees only through [`BuildContext`]. Every
//! check that can be made without a request happens here, so a tree that
//! was built successfully can only fail on data at evaluation time. Errors
//! carry the path of the node they came from.

use std::collections::HashMap;
use std::sync::Arc;

use pdp_core::{BuildError, BuildErrorKind, PdpError, Type, Value};

use crate::algorithm::{AlgorithmRegistry, BasicAlg, CombiningAlg, MapperParams};
use crate::attribute::{Attribute, AttributeAssignmentExpression};
use crate::config::PdpConfig;
use crate::effect::Effect;
use crate::expression::{Expression, FunctionCall, FunctionRegistry, Selector, SelectorOptions};
use crate::policy::{check_unique_ids, child_ids, Evaluable, Policy, PolicySet};
use crate::rule::Rule;
use crate::target::{Match, Target};

pub(crate) const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct BuildContext {
    functions: FunctionRegistry,
    rule_algs: AlgorithmRegistry,
    policy_algs: AlgorithmRegistry,
    attributes: HashMap<String, Attribute>,
    max_depth: usize,
    mapper_sub: BasicAlg,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildContext {
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::builtin(),
            rule_algs: AlgorithmRegistry::builtin(),
            policy_algs: AlgorithmRegistry::builtin(),
            attributes: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            mapper_sub: BasicAlg::FirstApplicable,
        }
    }

    pub fn from_config(cfg: &PdpConfig) -> pdp_core::Result<Self> {
        let mut ctx = Self::new();
        ctx.max_depth = cfg.engine.max_depth;
        ctx.mapper_sub = ctx
            .policy_algs
            .basic(&cfg.engine.mapper_sub_algorithm)
            .map_err(|e| PdpError::Config(format!("engine.mapper_sub_algorithm: {e}")))?;
        Ok(ctx)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn rule_algorithms_mut(&mut self) -> &mut AlgorithmRegistry {
        &mut self.rule_algs
    }

    pub fn policy_algorithms_mut(&mut self) -> &mut AlgorithmRegistry {
        &mut self.policy_algs
    }

    /// Declares an attribute. Declaring the same name again with the same
    /// type returns the existing attribute.
    pub fn make_attribute(&mut self, id: &str, ty: Type) -> Result<Attribute, BuildError> {
        if let Some(a) = self.attributes.get(id) {
            if a.ty() == ty {
                return Ok(a.clone());
            }
            return Err(BuildErrorKind::DuplicateAttribute(id.to_string()).into());
        }
        let a = Attribute::new(id, ty);
        self.attributes.insert(id.to_string(), a.clone());
        Ok(a)
    }

    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.attributes.get(id)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn make_designator(&self, id: &str) -> Result<Expression, BuildError> {
        self.attribute(id)
            .cloned()
            .map(Expression::Designator)
            .ok_or_else(|| BuildErrorKind::UndeclaredAttribute(id.to_string()).into())
    }

    /// Immediate value parsed from its canonical text.
    pub fn make_value(&self, ty: Type, text: &str) -> Result<Expression, BuildError> {
        Ok(Expression::Immediate(Value::parse(ty, text)?))
    }

    pub fn make_function_call(
        &self,
        name: &str,
        args: Vec<Expression>,
    ) -> Result<Expression, BuildError> {
        let call = FunctionCall::new(&self.functions, name, args)?;
        Ok(Expression::Call(Arc::new(call)))
    }

    pub fn make_selector(
        &self,
        uri: &str,
        path: Vec<Expression>,
        ty: Type,
        opts: SelectorOptions,
    ) -> Result<Expression, BuildError> {
        let s = Selector::new(uri, path, ty, opts)
            .map_err(|e| e.bind(format!("selector({uri})")))?;
        Ok(Expression::Selector(Arc::new(s)))
    }

    pub fn make_match(
        &self,
        name: &str,
        first: Expression,
        second: Expression,
    ) -> Result<Match, BuildError> {
        Match::new(&self.functions, name, first, second)
    }

    fn make_obligations(
        &self,
        obligations: Vec<(String, Expression)>,
    ) -> Result<Vec<AttributeAssignmentExpression>, BuildError> {
        obligations
            .into_iter()
            .enumerate()
            .map(|(i, (id, expr))| {
                self.make_obligation(&id, expr)
                    .map_err(|e| e.bind(format!("obligation #{i}")))
            })
            .collect()
    }

    fn make_obligation(
        &self,
        id: &str,
        expr: Expression,
    ) -> Result<AttributeAssignmentExpression, BuildError> {
        let attr = self
            .attribute(id)
            .ok_or_else(|| BuildError::new(BuildErrorKind::UndeclaredAttribute(id.to_string())))?;
        if attr.ty() != expr.result_type() {
            return Err(BuildErrorKind::AssignmentType {
                id: id.to_string(),
                expected: attr.ty(),
                actual: expr.result_type(),
            }
            .into());
        }
        Ok(AttributeAssignmentExpression::new(attr.clone(), expr))
    }

    pub fn new_rule(
        &self,
        id: Option<&str>,
        target: Target,
        condition: Option<Expression>,
        effect: Effect,
        obligations: Vec<(String, Expression)>,
    ) -> Result<Rule, BuildError> {
        let src = node_name("rule", id);

        if !effect.is_decisive() {
            return Err(BuildError::new(BuildErrorKind::AmbiguousNode(
                "rule effect must be Permit or Deny",
            ))
            .bind(src));
        }
        if let Some(c) = &condition {
            if c.result_type() != Type::Boolean {
                return Err(BuildError::new(BuildErrorKind::ConditionType(c.result_type()))
                    .bind("condition")
                    .bind(src));
            }
        }
        let obligations = self.make_obligations(obligations).map_err(|e| e.bind(src))?;

        Ok(Rule::new(
            id.map(str::to_string),
            target,
            condition,
            effect,
            obligations,
        ))
    }

    /// Policy over `rules` combined with rule algorithm `alg`. `params` are
    /// required by `mapper` and rejected by every other algorithm.
    pub fn new_policy(
        &self,
        id: Option<&str>,
        target: Target,
        rules: Vec<Rule>,
        alg: &str,
        params: Option<MapperParams>,
        obligations: Vec<(String, Expression)>,
    ) -> Result<Policy, BuildError> {
        let src = node_name("policy", id);
        let rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();

        let alg = self
            .make_alg(&self.rule_algs, alg, params, &child_ids(&rules))
            .map_err(|e| e.bind(src.clone()))?;
        let obligations = self.make_obligations(obligations).map_err(|e| e.bind(src))?;

        Ok(Policy::new(
            id.map(str::to_string),
            target,
            rules,
            alg,
            obligations,
        ))
    }

    pub fn new_policy_set(
        &self,
        id: Option<&str>,
        target: Target,
        policies: Vec<Arc<dyn Evaluable>>,
        alg: &str,
        params: Option<MapperParams>,
        obligations: Vec<(String, Expression)>,
    ) -> Result<PolicySet, BuildError> {
        let src = node_name("policy set", id);

        let alg = self
            .make_alg(&self.policy_algs, alg, params, &child_ids(&policies))
            .map_err(|e| e.bind(src.clone()))?;
        let obligations = self
            .make_obligations(obligations)
            .map_err(|e| e.bind(src.clone()))?;

        let set = PolicySet::new(id.map(str::to_string), target, policies, alg, obligations.into());
        if set.depth() > self.max_depth {
            return Err(BuildError::new(BuildErrorKind::TooDeep(self.max_depth)).bind(src));
        }
        Ok(set)
    }

    fn make_alg(
        &self,
        registry: &AlgorithmRegistry,
        name: &str,
        params: Option<MapperParams>,
        ids: &[Option<&str>],
    ) -> Result<CombiningAlg, BuildError> {
        check_unique_ids(ids)?;
        Ok(registry.make(name, params, ids, self.mapper_sub)?)
    }
}

fn node_name(kind: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{kind} {id:?}"),
        None => format!("hidden {kind}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn obligation_types_are_checked() {
        let mut b = BuildContext::new();
        b.make_attribute("s", Type::String).unwrap();

        let err = b
            .new_rule(
                Some("r"),
                Target::default(),
                None,
                Effect::Permit,
                vec![("s".into(), Expression::from(Value::Integer(1)))],
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "#2d (rule \"r\">obligation #0): can't assign Integer value to String attribute \"s\""
        );

        let err = b
            .new_rule(
                None,
                Target::default(),
                None,
                Effect::Deny,
                vec![("x".into(), Value::from(true).into())],
            )
            .unwrap_err();
        assert_eq!(err.path(), vec!["hidden rule", "obligation #0"]);
    }

    #[test]
    fn redeclared_attribute() {
        let mut b = BuildContext::new();
        let a = b.make_attribute("x", Type::Integer).unwrap();
        assert_eq!(b.make_attribute("x", Type::Integer).unwrap(), a);
        assert!(b.make_attribute("x", Type::Float).is_err());
    }
}
