//! Trusted proxy networks.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::{ConfigError, ConfigErrorKind};
use crate::literal::AddressFamily;

/// A single trusted network: an exact address or a masked prefix.
///
/// The base address is masked to the prefix length when the network is
/// built, so `10.1.2.3/8` is stored as `10.0.0.0/8`. An entry without a
/// prefix matches only the identical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrustedNetwork {
    net: IpNet,
    exact: bool,
}

impl TrustedNetwork {
    /// Parses a trusted network literal such as `10.0.0.1`, `10.0.0.0/8`
    /// or `2001:db8::/32`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the literal is empty, contains
    /// characters outside its address family's set, carries a prefix length
    /// wider than the family allows, or has an unparsable base address.
    pub fn parse(literal: &str) -> Result<Self, ConfigError> {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(ConfigError::new(
                ConfigErrorKind::Empty,
                "trusted network literal is empty",
            ));
        }

        let family = AddressFamily::sniff(literal).ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::InvalidCharacters,
                format!("'{literal}' is not an IPv4 or IPv6 literal"),
            )
        })?;

        let (base, prefix) = match literal.split_once('/') {
            Some((base, prefix)) => (base, Some(parse_prefix(literal, prefix, family)?)),
            None => (literal, None),
        };

        let addr: IpAddr = base.parse().map_err(|_| {
            ConfigError::new(
                ConfigErrorKind::InvalidAddress,
                format!("'{base}' in '{literal}' is not a valid {family} address"),
            )
        })?;

        let len = prefix.unwrap_or_else(|| family.max_prefix_len());
        let net = IpNet::new(addr, len)
            .map_err(|_| {
                ConfigError::new(
                    ConfigErrorKind::InvalidPrefixLength,
                    format!("prefix /{len} in '{literal}' is out of range"),
                )
            })?
            .trunc();

        Ok(Self {
            net,
            exact: prefix.is_none(),
        })
    }

    /// Returns the address family of this network.
    pub fn family(&self) -> AddressFamily {
        AddressFamily::from(&self.net.addr())
    }

    /// Returns the (masked) base address.
    pub fn base(&self) -> IpAddr {
        self.net.network()
    }

    /// Returns the configured prefix length, or `None` for an exact entry.
    pub fn prefix_len(&self) -> Option<u8> {
        (!self.exact).then(|| self.net.prefix_len())
    }

    /// Tests whether `addr` falls inside this network.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.net.contains(&addr)
    }
}

impl fmt::Display for TrustedNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exact {
            write!(f, "{}", self.net.addr())
        } else {
            write!(f, "{}", self.net)
        }
    }
}

fn parse_prefix(literal: &str, prefix: &str, family: AddressFamily) -> Result<u8, ConfigError> {
    let invalid = || {
        ConfigError::new(
            ConfigErrorKind::InvalidPrefixLength,
            format!(
                "prefix in '{literal}' must be within 0..={} for {family}",
                family.max_prefix_len()
            ),
        )
    };

    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    match prefix.parse::<u8>() {
        Ok(len) if len <= family.max_prefix_len() => Ok(len),
        _ => Err(invalid()),
    }
}

/// The set of networks whose connections are allowed to speak for clients.
///
/// Built once while configuration is loaded and never mutated afterward;
/// membership tests are pure, so a single set can be shared by every request
/// being processed concurrently.
///
/// # Examples
///
/// ```
/// use proxy_identity::ProxyTrustSet;
///
/// let trust = ProxyTrustSet::from_literals(["10.0.0.0/8", "192.0.2.10"]).unwrap();
///
/// assert!(trust.contains("10.20.30.40".parse().unwrap()));
/// assert!(trust.contains("192.0.2.10".parse().unwrap()));
/// assert!(!trust.contains("192.0.2.11".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyTrustSet {
    networks: Vec<TrustedNetwork>,
}

impl ProxyTrustSet {
    /// Creates an empty trust set. An empty set trusts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a trust set from a list of literals, failing on the first
    /// invalid one.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] of the first literal that fails to parse.
    pub fn from_literals<I, S>(literals: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for literal in literals {
            set.add(literal.as_ref())?;
        }
        Ok(set)
    }

    /// Adds a trusted network, deduplicating identical entries.
    ///
    /// # Errors
    ///
    /// See [`TrustedNetwork::parse`].
    pub fn add(&mut self, literal: &str) -> Result<(), ConfigError> {
        let network = TrustedNetwork::parse(literal)?;

        if !self.networks.contains(&network) {
            self.networks.push(network);
        }

        Ok(())
    }

    /// Tests whether `addr` belongs to any trusted network.
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(addr))
    }

    /// Returns the number of distinct trusted networks.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Returns true if no networks are trusted.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Iterates over the trusted networks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrustedNetwork> {
        self.networks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn exact_entry_matches_only_itself() {
        let trust = ProxyTrustSet::from_literals(["192.0.2.10"]).unwrap();
        assert!(trust.contains(ip("192.0.2.10")));
        assert!(!trust.contains(ip("192.0.2.11")));
        assert!(!trust.contains(ip("192.0.2.0")));
    }

    #[test]
    fn prefix_entry_masks_base_address() {
        let net = TrustedNetwork::parse("10.1.2.3/8").unwrap();
        assert_eq!(net.base(), ip("10.0.0.0"));
        assert_eq!(net.prefix_len(), Some(8));
        assert_eq!(net.to_string(), "10.0.0.0/8");
        assert!(net.contains(ip("10.255.0.1")));
        assert!(!net.contains(ip("11.0.0.1")));
    }

    #[test]
    fn zero_prefix_matches_whole_family() {
        let trust = ProxyTrustSet::from_literals(["0.0.0.0/0"]).unwrap();
        assert!(trust.contains(ip("203.0.113.9")));
        assert!(!trust.contains(ip("::1")));
    }

    #[test]
    fn cross_family_never_matches() {
        let trust = ProxyTrustSet::from_literals(["::/0", "::ffff:10.0.0.1"]).unwrap();
        assert!(trust.contains(ip("2001:db8::1")));
        assert!(!trust.contains(ip("10.0.0.1")));
    }

    #[test]
    fn ipv6_prefix() {
        let trust = ProxyTrustSet::from_literals(["2001:db8:abcd::/48"]).unwrap();
        assert!(trust.contains(ip("2001:db8:abcd:12::1")));
        assert!(!trust.contains(ip("2001:db8:abce::1")));
    }

    #[test]
    fn duplicate_entries_are_collapsed() {
        let trust =
            ProxyTrustSet::from_literals(["10.0.0.0/8", "10.9.9.9/8", " 10.0.0.0/8 "]).unwrap();
        assert_eq!(trust.len(), 1);
    }

    #[test]
    fn exact_and_full_prefix_are_distinct_entries() {
        let trust = ProxyTrustSet::from_literals(["10.0.0.1", "10.0.0.1/32"]).unwrap();
        assert_eq!(trust.len(), 2);
        let rendered: Vec<String> = trust.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["10.0.0.1", "10.0.0.1/32"]);
    }

    #[test]
    fn rejects_empty_literal() {
        let err = TrustedNetwork::parse("   ").unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::Empty);
    }

    #[test]
    fn rejects_foreign_characters() {
        for literal in ["10.0.0.x", "localhost", "[::1]", "10.0.0.0 /8"] {
            let err = TrustedNetwork::parse(literal).unwrap_err();
            assert_eq!(err.kind(), ConfigErrorKind::InvalidCharacters, "{literal}");
        }
    }

    #[test]
    fn rejects_bad_prefix_lengths() {
        for literal in ["10.0.0.0/33", "10.0.0.0/", "10.0.0.0/8/8", "::/129"] {
            let err = TrustedNetwork::parse(literal).unwrap_err();
            assert_eq!(
                err.kind(),
                ConfigErrorKind::InvalidPrefixLength,
                "{literal}"
            );
        }
    }

    #[test]
    fn mapped_v4_text_is_a_v6_network() {
        let net = TrustedNetwork::parse("::ffff:10.0.0.0/120").unwrap();
        assert_eq!(net.family(), AddressFamily::V6);
    }

    #[test]
    fn rejects_unparsable_base() {
        for literal in ["10.0.0", "256.0.0.1", "1::2::3", "10.0.0.0.0/8"] {
            let err = TrustedNetwork::parse(literal).unwrap_err();
            assert_eq!(err.kind(), ConfigErrorKind::InvalidAddress, "{literal}");
        }
    }

    #[test]
    fn empty_set_trusts_nothing() {
        let trust = ProxyTrustSet::new();
        assert!(trust.is_empty());
        assert!(!trust.contains(ip("127.0.0.1")));
    }

    mod proptests {
        use super::*;
        use crate::test_utils::{arb_ipv4, arb_ipv6};
        use proptest::prelude::*;

        fn top_bits_v4(addr: u32, p: u8) -> u32 {
            if p == 0 { 0 } else { addr >> (32 - u32::from(p)) }
        }

        fn top_bits_v6(addr: u128, p: u8) -> u128 {
            if p == 0 { 0 } else { addr >> (128 - u32::from(p)) }
        }

        proptest! {
            /// Property: v4 membership is exactly "same top p bits"
            #[test]
            fn proptest_v4_membership_matches_prefix_bits(
                base in arb_ipv4(),
                candidate in arb_ipv4(),
                p in 0u8..=32,
            ) {
                let net = TrustedNetwork::parse(&format!("{base}/{p}")).unwrap();
                let expected = top_bits_v4(base.into(), p) == top_bits_v4(candidate.into(), p);
                prop_assert_eq!(net.contains(IpAddr::V4(candidate)), expected);
                prop_assert!(net.contains(IpAddr::V4(base)));
            }

            /// Property: v6 membership is exactly "same top p bits"
            #[test]
            fn proptest_v6_membership_matches_prefix_bits(
                base in arb_ipv6(),
                candidate in arb_ipv6(),
                p in 0u8..=128,
            ) {
                let net = TrustedNetwork::parse(&format!("{base}/{p}")).unwrap();
                let expected = top_bits_v6(base.into(), p) == top_bits_v6(candidate.into(), p);
                prop_assert_eq!(net.contains(IpAddr::V6(candidate)), expected);
            }

            /// Property: a v4 network never contains a v6 address and vice versa
            #[test]
            fn proptest_cross_family_never_matches(
                v4 in arb_ipv4(),
                v6 in arb_ipv6(),
                p4 in 0u8..=32,
                p6 in 0u8..=128,
            ) {
                let net4 = TrustedNetwork::parse(&format!("{v4}/{p4}")).unwrap();
                let net6 = TrustedNetwork::parse(&format!("{v6}/{p6}")).unwrap();
                prop_assert!(!net4.contains(IpAddr::V6(v6)));
                prop_assert!(!net6.contains(IpAddr::V4(v4)));
            }

            /// Property: exact entries match only the identical address
            #[test]
            fn proptest_exact_entry_is_byte_exact(a in arb_ipv4(), b in arb_ipv4()) {
                let net = TrustedNetwork::parse(&a.to_string()).unwrap();
                prop_assert_eq!(net.contains(IpAddr::V4(b)), a == b);
            }
        }
    }
}
