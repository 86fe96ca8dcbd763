//! Prefix and suffix tree behavior.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::IpAddr;

use pdp_core::tree::{DomainTree, NetworkTree};
use pdp_core::{DomainName, Network};

fn net(s: &str) -> Network {
    Network::parse(s).unwrap()
}

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn domain(s: &str) -> DomainName {
    DomainName::parse(s).unwrap()
}

#[test]
fn network_longest_prefix() {
    let mut t = NetworkTree::new();
    t.insert(net("10.0.0.0/8"), "wide");
    t.insert(net("10.1.0.0/16"), "narrow");
    t.insert(net("2001:db8::/32"), "v6");

    assert_eq!(t.get_by_addr(&addr("10.1.2.3")), Some(&"narrow"));
    assert_eq!(t.get_by_addr(&addr("10.2.0.1")), Some(&"wide"));
    assert_eq!(t.get_by_addr(&addr("11.0.0.1")), None);
    assert_eq!(t.get_by_addr(&addr("2001:db8::1")), Some(&"v6"));
    // families don't mix
    assert_eq!(t.get_by_addr(&addr("::a00:1")), None);

    assert_eq!(t.get_by_net(&net("10.1.128.0/17")), Some(&"narrow"));
    assert_eq!(t.get_by_net(&net("10.0.0.0/7")), None);
    assert_eq!(t.get_exact(&net("10.1.0.0/16")), Some(&"narrow"));
    assert_eq!(t.get_exact(&net("10.1.0.0/17")), None);
}

#[test]
fn network_remove_and_order() {
    let mut t: NetworkTree<u8> = [
        (net("192.168.0.0/16"), 3),
        (net("10.0.0.0/8"), 1),
        (net("10.128.0.0/9"), 2),
        (net("::/0"), 4),
    ]
    .into_iter()
    .collect();
    assert_eq!(t.len(), 4);

    let order: Vec<String> = t.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(
        order,
        vec!["10.0.0.0/8", "10.128.0.0/9", "192.168.0.0/16", "::/0"]
    );

    assert_eq!(t.remove(&net("10.0.0.0/8")), Some(1));
    assert_eq!(t.remove(&net("10.0.0.0/8")), None);
    assert_eq!(t.len(), 3);
    assert_eq!(t.get_by_addr(&addr("10.1.1.1")), None);
    assert_eq!(t.get_by_addr(&addr("10.200.1.1")), Some(&2));
}

#[test]
fn domain_longest_suffix() {
    let mut t = DomainTree::new();
    t.insert(&domain("example.com"), 1);
    t.insert(&domain("mail.example.com"), 2);

    assert_eq!(t.get(&domain("www.example.com")), Some(&1));
    assert_eq!(t.get(&domain("a.mail.example.com")), Some(&2));
    assert_eq!(t.get(&domain("EXAMPLE.com.")), Some(&1));
    // label boundary, not string suffix
    assert_eq!(t.get(&domain("notexample.com")), None);
    assert_eq!(t.get(&domain("com")), None);
    assert_eq!(t.get_exact(&domain("www.example.com")), None);
}

#[test]
fn domain_remove_and_order() {
    let mut t = DomainTree::new();
    for (d, v) in [("example.org", 3), ("www.example.com", 2), ("example.com", 1)] {
        t.insert(&domain(d), v);
    }

    let order: Vec<String> = t.iter().map(|(d, _)| d.to_string()).collect();
    assert_eq!(order, vec!["example.com", "www.example.com", "example.org"]);

    assert_eq!(t.remove(&domain("example.com")), Some(1));
    assert_eq!(t.len(), 2);
    assert_eq!(t.get(&domain("a.example.com")), None);
    assert_eq!(t.get(&domain("www.example.com")), Some(&2));
}
