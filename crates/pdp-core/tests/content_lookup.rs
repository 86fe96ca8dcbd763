//! Content items keyed by mixed key kinds, aggregation and updates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pdp_core::content::ContentUpdate;
use pdp_core::{
    Aggregation, BuildErrorKind, ContentItem, ContentKey, ContentNode, DomainName, EvalErrorKind,
    LocalContent, LocalContentStorage, Network, Shard, Type, UpdateErrorKind, UpdateOp, Value,
};
use serde_json::json;
use uuid::Uuid;

fn net(s: &str) -> Network {
    Network::parse(s).unwrap()
}

fn domain(s: &str) -> DomainName {
    DomainName::parse(s).unwrap()
}

fn list(items: &[&str]) -> ContentNode {
    ContentNode::Value(Value::list_of_strings(items.iter().copied()))
}

/// region (string) -> source network -> destination domain -> tags
fn tags_item() -> ContentItem {
    let root = ContentNode::strings([
        (
            "eu",
            ContentNode::networks([
                (
                    net("10.0.0.0/8"),
                    ContentNode::domains([(domain("example.com"), list(&["a", "b"]))]),
                ),
                (
                    net("10.1.0.0/16"),
                    ContentNode::domains([(domain("example.com"), list(&["c", "b"]))]),
                ),
            ]),
        ),
        (
            "us",
            ContentNode::networks([(
                net("192.168.0.0/16"),
                ContentNode::domains([(domain("com"), list(&["b", "d"]))]),
            )]),
        ),
    ]);
    ContentItem::mapping(
        Type::ListOfStrings,
        vec![Type::String, Type::Address, Type::Domain],
        root,
    )
    .unwrap()
}

fn path(region: Value, src: Value, dst: &str) -> Vec<Value> {
    vec![region, src, Value::Domain(domain(dst))]
}

#[test]
fn mixed_key_kinds() {
    let item = tags_item();

    let v = item
        .lookup(&path("eu".into(), Value::Address("10.1.2.3".parse().unwrap()), "www.example.com"), None)
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["c", "b"]));

    let v = item
        .lookup(&path("eu".into(), Value::Address("10.2.0.1".parse().unwrap()), "example.com"), None)
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["a", "b"]));

    let err = item
        .lookup(&path("eu".into(), Value::Address("11.0.0.1".parse().unwrap()), "example.com"), None)
        .unwrap_err();
    assert!(err.is_missing_value());

    let err = item
        .lookup(&path("eu".into(), Value::Address("10.2.0.1".parse().unwrap()), "example.org"), None)
        .unwrap_err();
    assert!(err.is_missing_value());
}

#[test]
fn map_levels_at_the_root() {
    // network -> domain -> value, with both address families
    let by_net = ContentItem::mapping(
        Type::ListOfStrings,
        vec![Type::Network, Type::Domain],
        ContentNode::networks([
            (
                net("2001:db8::/32"),
                ContentNode::domains([(domain("example.net"), list(&["v6"]))]),
            ),
            (
                net("172.16.0.0/12"),
                ContentNode::domains([(domain("net"), list(&["v4"]))]),
            ),
        ]),
    )
    .unwrap();
    let v = by_net
        .lookup(&[Value::Network(net("2001:db8:1::/48")), Value::Domain(domain("a.example.net"))], None)
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["v6"]));
    let v = by_net
        .lookup(&[Value::Address("172.20.1.1".parse().unwrap()), Value::Domain(domain("example.net"))], None)
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["v4"]));

    // domain -> network -> value
    let by_domain = ContentItem::mapping(
        Type::ListOfStrings,
        vec![Type::Domain, Type::Address],
        ContentNode::domains([(
            domain("example.org"),
            ContentNode::networks([(net("10.0.0.0/8"), list(&["inner"]))]),
        )]),
    )
    .unwrap();
    let v = by_domain
        .lookup(&[Value::Domain(domain("mail.example.org")), Value::Address("10.9.9.9".parse().unwrap())], None)
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["inner"]));
    assert!(by_domain
        .lookup(&[Value::Domain(domain("example.com")), Value::Address("10.9.9.9".parse().unwrap())], None)
        .unwrap_err()
        .is_missing_value());
}

#[test]
fn multi_valued_keys() {
    let item = tags_item();
    let regions = Value::set_of_strings(["us", "eu"]);
    let sources = Value::set_of_networks([net("192.168.1.0/24"), net("10.1.0.0/16")]);

    let first = item
        .lookup(&path(regions.clone(), sources.clone(), "x.example.com"), None)
        .unwrap();
    assert_eq!(first, Value::list_of_strings(["c", "b"]));

    let all = item
        .lookup(
            &path(regions.clone(), sources.clone(), "x.example.com"),
            Some(Aggregation::Append),
        )
        .unwrap();
    assert_eq!(all, Value::list_of_strings(["c", "b", "b", "d"]));

    let unique = item
        .lookup(
            &path(regions, sources, "x.example.com"),
            Some(Aggregation::AppendUnique),
        )
        .unwrap();
    assert_eq!(unique, Value::list_of_strings(["c", "b", "d"]));
}

#[test]
fn path_errors() {
    let item = tags_item();

    let err = item.lookup(&[Value::from("eu")], None).unwrap_err();
    assert!(matches!(
        err.kind(),
        EvalErrorKind::InvalidSelectorPath {
            expected: 3,
            actual: 1
        }
    ));

    let err = item
        .lookup(&path(Value::Integer(1), Value::from("x"), "example.com"), None)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "#0a (1): Invalid key at level 0. Expected String but got Integer"
    );
}

#[test]
fn mapping_is_validated() {
    let err = ContentItem::mapping(
        Type::String,
        vec![Type::String],
        ContentNode::strings([("k", ContentNode::Value(Value::Integer(1)))]),
    )
    .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::InvalidContentItem(_)));
    assert_eq!(err.path(), vec!["k"]);

    let err = ContentItem::mapping(
        Type::String,
        vec![Type::Integer],
        ContentNode::strings([("k", ContentNode::Value(Value::from("v")))]),
    )
    .unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::InvalidContentItem(_)));
}

#[test]
fn keys_parse_by_level_kind() {
    assert_eq!(
        ContentKey::parse(Type::Address, "10.0.0.1").unwrap(),
        ContentKey::Network(net("10.0.0.1/32"))
    );
    assert_eq!(
        ContentKey::parse(Type::Network, "10.0.0.0/8").unwrap(),
        ContentKey::Network(net("10.0.0.0/8"))
    );
    assert!(ContentKey::parse(Type::Domain, "a..b").is_err());
    assert!(ContentKey::parse(Type::Integer, "1").is_err());
}

#[test]
fn items_serialize_to_json() {
    let item = ContentItem::value(Value::Integer(5));
    assert_eq!(item.to_json(), json!({"type": "Integer", "data": 5}));

    let item = ContentItem::mapping(
        Type::String,
        vec![Type::String],
        ContentNode::strings([("k", ContentNode::Value(Value::from("v")))]),
    )
    .unwrap()
    .with_shards(vec![Shard::new("s1", "a", "m")]);
    assert_eq!(
        item.to_json(),
        json!({
            "keys": ["String"],
            "type": "String",
            "shards": [{"name": "s1", "min": "a", "max": "m", "servers": []}],
            "data": {"k": "v"}
        })
    );
}

#[test]
fn storage_lookup_errors() {
    let s = LocalContentStorage::new([LocalContent::new("c", None).with_item("i", tags_item())]);
    assert!(s.get("c", "i").is_ok());
    assert!(matches!(
        s.get("missing", "i").unwrap_err().kind(),
        EvalErrorKind::MissingContent(c) if c == "missing"
    ));
    assert!(matches!(
        s.get("c", "missing").unwrap_err().kind(),
        EvalErrorKind::MissingContentItem(_)
    ));
    assert_eq!(s.ids(), vec!["c"]);
}

#[test]
fn transactions_check_tags() {
    let (t0, t1) = (Uuid::new_v4(), Uuid::new_v4());
    let s = LocalContentStorage::new([
        LocalContent::new("tagged", Some(t0)).with_item("i", tags_item()),
        LocalContent::new("untagged", None),
    ]);

    let err = s.new_transaction("untagged", &t0).unwrap_err();
    assert!(err.is_tag_mismatch());
    assert!(matches!(err.kind(), UpdateErrorKind::UntaggedStorage));

    let err = s.new_transaction("tagged", &t1).unwrap_err();
    assert!(matches!(err.kind(), UpdateErrorKind::TagMismatch { .. }));

    let err = s.new_transaction("nope", &t0).unwrap_err();
    assert!(matches!(err.kind(), UpdateErrorKind::MissingContent(_)));

    // nested add creates intermediate maps
    let mut u = ContentUpdate::new("tagged", t0, t1);
    u.append(
        UpdateOp::Add,
        vec!["i".into(), "apac".into(), "172.16.0.0/12".into(), "example.net".into()],
        Some(ContentItem::value(Value::list_of_strings(["z"]))),
    );
    let mut tx = s.new_transaction("tagged", &t0).unwrap();
    tx.apply(&u).unwrap();

    // the same update can't be applied twice
    let err = tx.apply(&u).unwrap_err();
    assert!(err.is_tag_mismatch());

    let next = tx.commit(&s);
    let v = next
        .get("tagged", "i")
        .unwrap()
        .lookup(
            &path(
                "apac".into(),
                Value::Address("172.16.5.5".parse().unwrap()),
                "www.example.net",
            ),
            None,
        )
        .unwrap();
    assert_eq!(v, Value::list_of_strings(["z"]));
    assert!(next.content("untagged").is_some());
}
