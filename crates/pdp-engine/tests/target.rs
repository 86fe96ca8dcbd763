//! Targets of rules, policies and policy sets.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use pdp_core::{BuildErrorKind, EvalErrorKind, Type, Value};
use pdp_engine::{AllOf, AnyOf, BuildContext, Context, Effect, Evaluable, Match, Target};

fn builder() -> BuildContext {
    let mut b = BuildContext::new();
    b.make_attribute("role", Type::String).unwrap();
    b.make_attribute("port", Type::Integer).unwrap();
    b
}

fn role_is(b: &BuildContext, role: &str) -> Match {
    b.make_match("equal", Value::string(role).into(), b.make_designator("role").unwrap())
        .unwrap()
}

fn port_above(b: &BuildContext, port: i64) -> Match {
    b.make_match("greater", b.make_designator("port").unwrap(), Value::Integer(port).into())
        .unwrap()
}

fn request(role: Option<&str>, port: Option<i64>) -> Context {
    let mut ctx = Context::default();
    if let Some(r) = role {
        ctx.insert("role", Value::string(r));
    }
    if let Some(p) = port {
        ctx.insert("port", Value::Integer(p));
    }
    ctx
}

#[test]
fn empty_target_matches() {
    let t = Target::default();
    assert!(t.is_empty());
    assert!(t.calculate(&Context::default()).unwrap());
}

#[test]
fn and_of_or_of_and() {
    let b = builder();
    // (role = admin AND port > 1024) OR role = ops
    let any = AnyOf::new(vec![
        AllOf::new(vec![role_is(&b, "admin"), port_above(&b, 1024)]),
        AllOf::new(vec![role_is(&b, "ops")]),
    ]);
    let t = Target::new(vec![any]);

    assert!(t.calculate(&request(Some("admin"), Some(8080))).unwrap());
    assert!(!t.calculate(&request(Some("admin"), Some(80))).unwrap());
    assert!(t.calculate(&request(Some("ops"), None)).unwrap());
    assert!(!t.calculate(&request(Some("guest"), Some(8080))).unwrap());

    // every AnyOf must hold
    let mut t = t;
    let mut any = AnyOf::default();
    any.push(AllOf::new(vec![port_above(&b, 9000)]));
    t.push(any);
    assert!(!t.calculate(&request(Some("admin"), Some(8080))).unwrap());
    assert!(t.calculate(&request(Some("admin"), Some(9090))).unwrap());
}

#[test]
fn short_circuit_skips_missing_attribute() {
    let b = builder();
    let t = Target::new(vec![AnyOf::new(vec![AllOf::new(vec![
        role_is(&b, "admin"),
        port_above(&b, 1024),
    ])])]);

    assert!(!t.calculate(&request(Some("guest"), None)).unwrap());

    let err = t.calculate(&request(Some("admin"), None)).unwrap_err();
    assert_eq!(err.kind(), &EvalErrorKind::MissingAttribute);
    assert_eq!(
        err.path(),
        vec!["target", "any", "all", "match", "greater", "argument #0", "attr(port.integer)"]
    );
}

#[test]
fn match_shape() {
    let b = builder();
    let err = b
        .make_match(
            "equal",
            b.make_designator("role").unwrap(),
            b.make_designator("role").unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), &BuildErrorKind::MatchOperands);

    let err = b
        .make_match("add", b.make_designator("port").unwrap(), Value::Integer(1).into())
        .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::MatchResultType { .. }));

    // constant may come first or second
    assert!(b
        .make_match("less", b.make_designator("port").unwrap(), Value::Integer(1).into())
        .is_ok());
}

#[test]
fn rule_target_error_is_indeterminate() {
    let b = builder();
    let target = Target::new(vec![AnyOf::new(vec![AllOf::new(vec![port_above(&b, 10)])])]);
    let rule = b
        .new_rule(Some("r"), target, None, Effect::Deny, vec![])
        .unwrap();
    let p = b
        .new_policy(Some("p"), Target::default(), vec![rule], "denyoverrides", None, vec![])
        .unwrap();

    let r = p.calculate(&request(None, None));
    assert_eq!(r.effect, Effect::IndeterminateD);
    assert!(r.status_message().contains("Missing attribute"));

    assert_eq!(p.calculate(&request(None, Some(1))).effect, Effect::NotApplicable);
    assert_eq!(p.calculate(&request(None, Some(11))).effect, Effect::Deny);
}

#[test]
fn policy_target_error_folds_child_effect() {
    let mut b = builder();
    b.make_attribute("flag", Type::Boolean).unwrap();
    let failing_target =
        || Target::new(vec![AnyOf::new(vec![AllOf::new(vec![port_above(&b, 10)])])]);

    let policy = |effect: Effect, condition: Option<bool>| -> Arc<dyn Evaluable> {
        let rule = b
            .new_rule(
                Some("r"),
                Target::default(),
                condition.map(|c| Value::from(c).into()),
                effect,
                vec![],
            )
            .unwrap();
        Arc::new(
            b.new_policy(Some("p"), failing_target(), vec![rule], "denyoverrides", None, vec![])
                .unwrap(),
        )
    };
    let ctx = request(None, None);

    let r = policy(Effect::Permit, None).calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateP);
    let msg = r.status_message();
    assert!(msg.starts_with("#02 (policy \"p\">target>"), "{msg}");

    assert_eq!(
        policy(Effect::Deny, None).calculate(&ctx).effect,
        Effect::IndeterminateD
    );
    assert_eq!(
        policy(Effect::Deny, Some(false)).calculate(&ctx).effect,
        Effect::Indeterminate
    );

    // child error and target error are both reported
    let rule = b
        .new_rule(
            Some("r"),
            Target::default(),
            Some(b.make_designator("flag").unwrap()),
            Effect::Permit,
            vec![],
        )
        .unwrap();
    let p = b
        .new_policy(Some("p"), failing_target(), vec![rule], "denyoverrides", None, vec![])
        .unwrap();
    let r = p.calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateP);
    match r.status.as_ref().unwrap().kind() {
        EvalErrorKind::Multi(errs) => assert_eq!(errs.len(), 2),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn policy_set_target() {
    let b = builder();
    let rule = b
        .new_rule(Some("r"), Target::default(), None, Effect::Permit, vec![])
        .unwrap();
    let p: Arc<dyn Evaluable> = Arc::new(
        b.new_policy(Some("p"), Target::default(), vec![rule], "denyoverrides", None, vec![])
            .unwrap(),
    );
    let target = Target::new(vec![AnyOf::new(vec![AllOf::new(vec![role_is(&b, "admin")])])]);
    let set = b
        .new_policy_set(Some("s"), target, vec![p], "permitoverrides", None, vec![])
        .unwrap();

    assert_eq!(set.calculate(&request(Some("admin"), None)).effect, Effect::Permit);
    assert_eq!(
        set.calculate(&request(Some("guest"), None)).effect,
        Effect::NotApplicable
    );
    let r = set.calculate(&request(None, None));
    assert_eq!(r.effect, Effect::IndeterminateP);
    assert!(r.status_message().contains("policy set \"s\">target"));
}
