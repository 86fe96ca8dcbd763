//! Combining algorithms over rules and policies.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use pdp_core::{BuildErrorKind, EvalErrorKind, Type, Value};
use pdp_engine::{
    BasicAlg, BuildContext, Context, Effect, Evaluable, Expression, MapperParams, Rule, Target,
};

/// How a test rule behaves on every request.
#[derive(Clone, Copy)]
enum Outcome {
    Applies,
    Skips,
    Fails,
}

fn builder() -> BuildContext {
    let mut b = BuildContext::new();
    b.make_attribute("missing", Type::Boolean).unwrap();
    b.make_attribute("tag", Type::String).unwrap();
    b.make_attribute("label", Type::String).unwrap();
    b
}

/// Applicable rule whose "tag" obligation reads the absent "label" attribute.
fn rule_with_broken_obligation(b: &BuildContext, id: &str, effect: Effect) -> Rule {
    b.new_rule(
        Some(id),
        Target::default(),
        None,
        effect,
        vec![("tag".into(), b.make_designator("label").unwrap())],
    )
    .unwrap()
}

fn rule(b: &BuildContext, id: &str, effect: Effect, outcome: Outcome) -> Rule {
    let condition = match outcome {
        Outcome::Applies => None,
        Outcome::Skips => Some(Expression::from(Value::from(false))),
        Outcome::Fails => Some(b.make_designator("missing").unwrap()),
    };
    b.new_rule(
        Some(id),
        Target::default(),
        condition,
        effect,
        vec![("tag".into(), Value::string(id).into())],
    )
    .unwrap()
}

fn policy(b: &BuildContext, alg: &str, rules: Vec<Rule>) -> Arc<dyn Evaluable> {
    Arc::new(
        b.new_policy(Some("p"), Target::default(), rules, alg, None, vec![])
            .unwrap(),
    )
}

fn tags(r: &pdp_engine::Response) -> Vec<String> {
    r.obligations
        .iter()
        .map(|o| o.value().serialize())
        .collect()
}

#[test]
fn first_applicable() {
    let b = builder();
    let ctx = Context::default();

    let p = policy(
        &b,
        "firstapplicableeffect",
        vec![
            rule(&b, "skip", Effect::Deny, Outcome::Skips),
            rule(&b, "permit", Effect::Permit, Outcome::Applies),
            rule(&b, "deny", Effect::Deny, Outcome::Applies),
        ],
    );
    let r = p.calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["permit"]);

    // an error stops the scan
    let p = policy(
        &b,
        "firstapplicableeffect",
        vec![
            rule(&b, "broken", Effect::Deny, Outcome::Fails),
            rule(&b, "permit", Effect::Permit, Outcome::Applies),
        ],
    );
    assert_eq!(p.calculate(&ctx).effect, Effect::IndeterminateD);

    let p = policy(&b, "firstapplicableeffect", vec![]);
    assert_eq!(p.calculate(&ctx).effect, Effect::NotApplicable);
}

#[test]
fn deny_overrides() {
    let b = builder();
    let ctx = Context::default();
    let run = |rules: Vec<Rule>| policy(&b, "denyoverrides", rules).calculate(&ctx);

    let r = run(vec![
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
        rule(&b, "d1", Effect::Deny, Outcome::Applies),
        rule(&b, "d2", Effect::Deny, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::Deny);
    assert_eq!(tags(&r), vec!["d1"]);

    let r = run(vec![
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
        rule(&b, "p2", Effect::Permit, Outcome::Applies),
        rule(&b, "d1", Effect::Deny, Outcome::Skips),
    ]);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["p1", "p2"]);

    let r = run(vec![
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
        rule(&b, "d1", Effect::Deny, Outcome::Fails),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateDP);
    assert!(r.obligations.is_empty());
    let msg = r.status_message();
    assert!(msg.contains("deny overrides>rule \"d1\""), "{msg}");

    let r = run(vec![
        rule(&b, "d1", Effect::Deny, Outcome::Fails),
        rule(&b, "d2", Effect::Deny, Outcome::Skips),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateD);

    let r = run(vec![
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
        rule(&b, "p2", Effect::Permit, Outcome::Fails),
    ]);
    assert_eq!(r.effect, Effect::Permit);

    let r = run(vec![rule(&b, "p1", Effect::Permit, Outcome::Fails)]);
    assert_eq!(r.effect, Effect::IndeterminateP);

    let r = run(vec![rule(&b, "d1", Effect::Deny, Outcome::Skips)]);
    assert_eq!(r.effect, Effect::NotApplicable);
}

#[test]
fn permit_overrides() {
    let b = builder();
    let ctx = Context::default();
    let run = |rules: Vec<Rule>| policy(&b, "PermitOverrides", rules).calculate(&ctx);

    let r = run(vec![
        rule(&b, "d1", Effect::Deny, Outcome::Applies),
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["p1"]);

    let r = run(vec![
        rule(&b, "d1", Effect::Deny, Outcome::Applies),
        rule(&b, "p1", Effect::Permit, Outcome::Fails),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateDP);

    let r = run(vec![
        rule(&b, "d1", Effect::Deny, Outcome::Fails),
        rule(&b, "d2", Effect::Deny, Outcome::Fails),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateD);
    match r.status.as_ref().unwrap().kind() {
        EvalErrorKind::Multi(errs) => assert_eq!(errs.len(), 2),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn policy_obligations_follow_rule_obligations() {
    let mut b = builder();
    b.make_attribute("policy", Type::String).unwrap();

    let p = b
        .new_policy(
            Some("p"),
            Target::default(),
            vec![
                rule(&b, "r1", Effect::Permit, Outcome::Applies),
                rule(&b, "r2", Effect::Permit, Outcome::Applies),
            ],
            "permitoverrides",
            None,
            vec![("policy".into(), Value::string("p").into())],
        )
        .unwrap();
    let r = p.calculate(&Context::default());
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["r1", "p"]);

    let p = b
        .new_policy(
            Some("p"),
            Target::default(),
            vec![rule(&b, "r1", Effect::Permit, Outcome::Skips)],
            "permitoverrides",
            None,
            vec![("policy".into(), Value::string("p").into())],
        )
        .unwrap();
    let r = p.calculate(&Context::default());
    assert_eq!(r.effect, Effect::NotApplicable);
    assert!(r.obligations.is_empty());
}

#[test]
fn failing_obligation_under_deny_overrides() {
    let b = builder();
    let ctx = Context::default();
    let run = |rules: Vec<Rule>| policy(&b, "denyoverrides", rules).calculate(&ctx);

    // a sibling permit can't hide the winning rule's failed obligation
    let r = run(vec![
        rule_with_broken_obligation(&b, "a", Effect::Permit),
        rule(&b, "c", Effect::Permit, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateP);
    assert!(r.obligations.is_empty());
    let msg = r.status_message();
    assert!(msg.contains("(obligations>assignment to \"tag\">attr(label.string))"), "{msg}");
    assert!(msg.contains("Missing attribute"), "{msg}");

    // losers' obligations are never evaluated
    let r = run(vec![
        rule_with_broken_obligation(&b, "a", Effect::Permit),
        rule(&b, "d", Effect::Deny, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::Deny);
    assert_eq!(tags(&r), vec!["d"]);
    assert!(r.status.is_none());

    let r = run(vec![
        rule_with_broken_obligation(&b, "d1", Effect::Deny),
        rule(&b, "d2", Effect::Deny, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateD);
}

#[test]
fn failing_obligation_under_permit_overrides() {
    let b = builder();
    let ctx = Context::default();
    let run = |rules: Vec<Rule>| policy(&b, "permitoverrides", rules).calculate(&ctx);

    let r = run(vec![
        rule_with_broken_obligation(&b, "d1", Effect::Deny),
        rule(&b, "p1", Effect::Permit, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["p1"]);

    let r = run(vec![
        rule(&b, "d1", Effect::Deny, Outcome::Applies),
        rule_with_broken_obligation(&b, "d2", Effect::Deny),
        rule(&b, "d3", Effect::Deny, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateD);
    assert!(r.obligations.is_empty());

    // every failure is reported
    let r = run(vec![
        rule_with_broken_obligation(&b, "p1", Effect::Permit),
        rule_with_broken_obligation(&b, "p2", Effect::Permit),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateP);
    match r.status.as_ref().unwrap().kind() {
        EvalErrorKind::Multi(errs) => assert_eq!(errs.len(), 2),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn failing_obligation_under_first_applicable() {
    let b = builder();
    let ctx = Context::default();
    let run = |rules: Vec<Rule>| policy(&b, "firstapplicableeffect", rules).calculate(&ctx);

    let r = run(vec![
        rule(&b, "skip", Effect::Deny, Outcome::Skips),
        rule_with_broken_obligation(&b, "a", Effect::Permit),
        rule(&b, "c", Effect::Permit, Outcome::Applies),
    ]);
    assert_eq!(r.effect, Effect::IndeterminateP);

    let r = run(vec![
        rule(&b, "d", Effect::Deny, Outcome::Applies),
        rule_with_broken_obligation(&b, "a", Effect::Permit),
    ]);
    assert_eq!(r.effect, Effect::Deny);
    assert_eq!(tags(&r), vec!["d"]);

    // the rule alone gives the same answer as the policy
    let r = rule_with_broken_obligation(&b, "a", Effect::Deny).calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateD);
}

#[test]
fn failing_policy_obligation() {
    let b = builder();
    let ctx = Context::default();

    let broken = Arc::new(
        b.new_policy(
            Some("broken"),
            Target::default(),
            vec![rule(&b, "r", Effect::Permit, Outcome::Applies)],
            "firstapplicableeffect",
            None,
            vec![("tag".into(), b.make_designator("label").unwrap())],
        )
        .unwrap(),
    ) as Arc<dyn Evaluable>;
    let permit = policy(&b, "firstapplicableeffect", vec![rule(&b, "ok", Effect::Permit, Outcome::Applies)]);
    let deny = Arc::new(
        b.new_policy(
            Some("d"),
            Target::default(),
            vec![rule(&b, "no", Effect::Deny, Outcome::Applies)],
            "firstapplicableeffect",
            None,
            vec![],
        )
        .unwrap(),
    ) as Arc<dyn Evaluable>;

    assert_eq!(broken.calculate(&ctx).effect, Effect::IndeterminateP);

    let set = |children: Vec<Arc<dyn Evaluable>>| {
        b.new_policy_set(Some("s"), Target::default(), children, "denyoverrides", None, vec![])
            .unwrap()
    };

    let r = set(vec![broken.clone(), permit.clone()]).calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateP);
    assert!(r.obligations.is_empty());

    let r = set(vec![broken, permit, deny]).calculate(&ctx);
    assert_eq!(r.effect, Effect::Deny);
    assert_eq!(tags(&r), vec!["no"]);

    // the same obligation resolves once the attribute is there
    let mut ctx = Context::default();
    ctx.insert("label", Value::string("late"));
    let ok = b
        .new_policy(
            Some("p"),
            Target::default(),
            vec![rule(&b, "r", Effect::Permit, Outcome::Applies)],
            "firstapplicableeffect",
            None,
            vec![("tag".into(), b.make_designator("label").unwrap())],
        )
        .unwrap();
    let r = ok.calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(tags(&r), vec!["r", "late"]);
}

#[test]
fn policy_set_combines_policies() {
    let b = builder();
    let ctx = Context::default();

    let permit = policy(&b, "firstapplicableeffect", vec![rule(&b, "r", Effect::Permit, Outcome::Applies)]);
    let broken = Arc::new(
        b.new_policy(
            Some("broken"),
            Target::default(),
            vec![rule(&b, "r", Effect::Deny, Outcome::Fails)],
            "firstapplicableeffect",
            None,
            vec![],
        )
        .unwrap(),
    ) as Arc<dyn Evaluable>;

    let set = b
        .new_policy_set(
            Some("s"),
            Target::default(),
            vec![permit.clone(), broken],
            "denyoverrides",
            None,
            vec![],
        )
        .unwrap();
    assert_eq!(set.depth(), 2);
    let r = set.calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateDP);
    let msg = r.status_message();
    assert!(
        msg.contains("policy set \"s\">deny overrides>policy \"broken\">rule \"r\""),
        "{msg}"
    );

    let set = b
        .new_policy_set(Some("s"), Target::default(), vec![permit], "denyoverrides", None, vec![])
        .unwrap();
    assert_eq!(set.calculate(&ctx).effect, Effect::Permit);
}

#[test]
fn algorithm_construction_errors() {
    let b = builder();
    let rules = || vec![rule(&b, "r", Effect::Permit, Outcome::Applies)];

    let err = b
        .new_policy(Some("p"), Target::default(), rules(), "onlyoneapplicable", None, vec![])
        .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::UnknownAlgorithm(_)));
    assert_eq!(err.path(), vec!["policy \"p\""]);

    let err = b
        .new_policy(Some("p"), Target::default(), rules(), "mapper", None, vec![])
        .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::MissingAlgorithmParam { .. }));

    let params = MapperParams::new(Value::string("r").into());
    let err = b
        .new_policy(Some("p"), Target::default(), rules(), "denyoverrides", Some(params), vec![])
        .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::UnexpectedAlgorithmParams(_)));

    let params = MapperParams::new(Value::string("r").into()).with_sub_algorithm("mapper");
    let err = b
        .new_policy(Some("p"), Target::default(), rules(), "mapper", Some(params), vec![])
        .unwrap_err();
    assert_eq!(err.kind(), &BuildErrorKind::NestedMapper);

    let mut twice = rules();
    twice.extend(rules());
    let err = b
        .new_policy(Some("p"), Target::default(), twice, "denyoverrides", None, vec![])
        .unwrap_err();
    assert_eq!(err.kind(), &BuildErrorKind::DuplicateId("r".into()));
}

#[test]
fn algorithm_aliases() {
    let mut b = builder();
    b.rule_algorithms_mut()
        .register_alias("first-applicable", "FirstApplicableEffect")
        .unwrap();
    assert!(b
        .rule_algorithms_mut()
        .register_alias("denyOverrides", "permitoverrides")
        .is_err());

    let p = b
        .new_policy(
            Some("p"),
            Target::default(),
            vec![rule(&b, "r", Effect::Deny, Outcome::Applies)],
            "First-Applicable",
            None,
            vec![],
        )
        .unwrap();
    assert_eq!(p.algorithm().name(), "firstapplicableeffect");
    assert_eq!(p.calculate(&Context::default()).effect, Effect::Deny);

    // policy algorithms are registered separately
    assert!(b
        .new_policy_set(Some("s"), Target::default(), vec![], "first-applicable", None, vec![])
        .is_err());
    assert_eq!(BasicAlg::PermitOverrides.name(), "permitoverrides");
}

#[test]
fn too_deep() {
    let b = builder().with_max_depth(2);
    let leaf = policy(&b, "denyoverrides", vec![]);
    let inner: Arc<dyn Evaluable> = Arc::new(
        b.new_policy_set(Some("s1"), Target::default(), vec![leaf], "denyoverrides", None, vec![])
            .unwrap(),
    );
    let err = b
        .new_policy_set(Some("s2"), Target::default(), vec![inner], "denyoverrides", None, vec![])
        .unwrap_err();
    assert_eq!(err.kind(), &BuildErrorKind::TooDeep(2));
}
