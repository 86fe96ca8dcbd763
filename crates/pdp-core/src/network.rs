//! IP networks.
//!
//! Both address families are handled as a left-aligned `u128` plus a bit
//! width so prefix trees can walk them the same way.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::ValueError;

/// IPv4 or IPv6 network with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, ValueError> {
        let width = family_width(&addr);
        if prefix > width {
            return Err(ValueError::InvalidNetwork {
                text: format!("{addr}/{prefix}"),
                reason: format!("prefix length exceeds {width}"),
            });
        }

        let bits = mask(addr_bits(&addr), prefix);
        Ok(Self {
            addr: bits_to_addr(bits, width),
            prefix,
        })
    }

    /// Single-host network covering exactly `addr`.
    pub fn host(addr: IpAddr) -> Self {
        Self {
            prefix: family_width(&addr),
            addr,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let (a, p) = s.split_once('/').ok_or_else(|| ValueError::InvalidNetwork {
            text: s.to_string(),
            reason: "missing prefix length".into(),
        })?;

        let addr: IpAddr = a.parse().map_err(|_| ValueError::InvalidNetwork {
            text: s.to_string(),
            reason: format!("invalid address {a:?}"),
        })?;
        let prefix: u8 = p.parse().map_err(|_| ValueError::InvalidNetwork {
            text: s.to_string(),
            reason: format!("invalid prefix length {p:?}"),
        })?;

        Network::new(addr, prefix)
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        if addr.is_ipv4() != self.addr.is_ipv4() {
            return false;
        }
        mask(addr_bits(addr), self.prefix) == addr_bits(&self.addr)
    }

    /// True if `other` lies entirely within this network.
    pub fn covers(&self, other: &Network) -> bool {
        other.prefix >= self.prefix && self.contains(&other.addr)
    }

    pub(crate) fn bits(&self) -> (u128, u8) {
        (addr_bits(&self.addr), self.prefix)
    }

    pub(crate) fn from_bits(bits: u128, prefix: u8, v4: bool) -> Self {
        let width = if v4 { 32 } else { 128 };
        Self {
            addr: bits_to_addr(bits, width),
            prefix,
        }
    }
}

impl FromStr for Network {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::parse(s)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

pub(crate) fn family_width(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Address bits aligned to the most significant bit of a `u128`.
pub(crate) fn addr_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => (u32::from(*a) as u128) << 96,
        IpAddr::V6(a) => u128::from(*a),
    }
}

fn bits_to_addr(bits: u128, width: u8) -> IpAddr {
    if width == 32 {
        IpAddr::V4(Ipv4Addr::from((bits >> 96) as u32))
    } else {
        IpAddr::V6(Ipv6Addr::from(bits))
    }
}

fn mask(bits: u128, prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        bits & (u128::MAX << (128 - u32::from(prefix)))
    }
}

/// Bit `i` counted from the most significant bit.
pub(crate) fn bit_at(bits: u128, i: u8) -> usize {
    ((bits >> (127 - u32::from(i))) & 1) as usize
}
