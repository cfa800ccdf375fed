//! Lexical handling of address literals.
//!
//! Both trusted-network configuration and forwarded headers carry addresses
//! as text. Before any real parsing happens, a token is sniffed against the
//! character set of its address family: a token containing `:` is treated as
//! IPv6, anything else as IPv4. Tokens with characters outside that set are
//! not addresses at all and are rejected up front.

use std::fmt;
use std::net::IpAddr;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl AddressFamily {
    /// Determines the family a token would belong to, if its characters fit.
    ///
    /// Returns `None` for empty tokens and for tokens containing characters
    /// outside the family's set (v4: digits, `.`, `/`; v6: hex digits, `:`,
    /// `.`, `/`).
    ///
    /// # Examples
    ///
    /// ```
    /// use proxy_identity::AddressFamily;
    ///
    /// assert_eq!(AddressFamily::sniff("10.0.0.1"), Some(AddressFamily::V4));
    /// assert_eq!(AddressFamily::sniff("fe80::1/64"), Some(AddressFamily::V6));
    /// assert_eq!(AddressFamily::sniff("unknown"), None);
    /// ```
    pub fn sniff(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }

        let family = if token.contains(':') {
            Self::V6
        } else {
            Self::V4
        };

        token.chars().all(|c| family.allows(c)).then_some(family)
    }

    /// Returns the widest prefix length valid for this family.
    pub fn max_prefix_len(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    fn allows(self, c: char) -> bool {
        match self {
            Self::V4 => c.is_ascii_digit() || c == '.' || c == '/',
            Self::V6 => c.is_ascii_hexdigit() || c == ':' || c == '.' || c == '/',
        }
    }
}

impl From<&IpAddr> for AddressFamily {
    fn from(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// A token that lexically looks like an address.
///
/// The text is kept verbatim so that a token which passes the character-set
/// test but is not a valid address (`300.1.1.1`, `10.0.0.0/8`) can still be
/// reported and, if resolution stops on it, become the perceived client
/// address.
///
/// # Examples
///
/// ```
/// use proxy_identity::AddressLiteral;
///
/// let lit = AddressLiteral::parse("203.0.113.5").unwrap();
/// assert!(lit.ip().is_some());
///
/// let odd = AddressLiteral::parse("300.1.1.1").unwrap();
/// assert!(odd.ip().is_none());
///
/// assert!(AddressLiteral::parse("unknown").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressLiteral {
    text: String,
    ip: Option<IpAddr>,
}

impl AddressLiteral {
    /// Accepts a token that passes the character-set test.
    ///
    /// The token is expected to be trimmed already.
    pub fn parse(token: &str) -> Option<Self> {
        AddressFamily::sniff(token)?;

        Some(Self {
            text: token.to_string(),
            ip: token.parse().ok(),
        })
    }

    /// Returns the literal text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the parsed address, if the literal is a valid address.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// Returns true if the literal is a syntactically valid address.
    pub fn is_valid(&self) -> bool {
        self.ip.is_some()
    }
}

impl From<IpAddr> for AddressLiteral {
    fn from(ip: IpAddr) -> Self {
        Self {
            text: ip.to_string(),
            ip: Some(ip),
        }
    }
}

impl fmt::Display for AddressLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_picks_v6_when_colon_present() {
        assert_eq!(AddressFamily::sniff("::1"), Some(AddressFamily::V6));
        assert_eq!(AddressFamily::sniff("2001:DB8::1"), Some(AddressFamily::V6));
        assert_eq!(
            AddressFamily::sniff("::ffff:192.0.2.1"),
            Some(AddressFamily::V6)
        );
    }

    #[test]
    fn sniff_rejects_foreign_characters() {
        assert_eq!(AddressFamily::sniff(""), None);
        assert_eq!(AddressFamily::sniff("10.0.0.x"), None);
        assert_eq!(AddressFamily::sniff("10.0.0.1 "), None);
        assert_eq!(AddressFamily::sniff("fe80::1%eth0"), None);
        assert_eq!(AddressFamily::sniff("[::1]"), None);
        assert_eq!(AddressFamily::sniff("abcd"), None);
    }

    #[test]
    fn sniff_accepts_prefix_slash() {
        assert_eq!(AddressFamily::sniff("10.0.0.0/8"), Some(AddressFamily::V4));
        assert_eq!(AddressFamily::sniff("fd00::/8"), Some(AddressFamily::V6));
    }

    #[test]
    fn max_prefix_len_per_family() {
        assert_eq!(AddressFamily::V4.max_prefix_len(), 32);
        assert_eq!(AddressFamily::V6.max_prefix_len(), 128);
    }

    #[test]
    fn literal_keeps_invalid_text() {
        let lit = AddressLiteral::parse("1.2.3").unwrap();
        assert_eq!(lit.as_str(), "1.2.3");
        assert!(!lit.is_valid());
        assert_eq!(lit.to_string(), "1.2.3");
    }

    #[test]
    fn literal_from_ip_is_valid() {
        let ip: IpAddr = "2001:db8::7".parse().unwrap();
        let lit = AddressLiteral::from(ip);
        assert_eq!(lit.ip(), Some(ip));
        assert_eq!(lit.as_str(), "2001:db8::7");
    }

    mod proptests {
        use super::*;
        use crate::test_utils::arb_ip;
        use proptest::prelude::*;

        proptest! {
            /// Property: every rendered address passes its own family's sniff
            #[test]
            fn proptest_rendered_addresses_sniff_as_their_family(ip in arb_ip()) {
                let text = ip.to_string();
                prop_assert_eq!(AddressFamily::sniff(&text), Some(AddressFamily::from(&ip)));

                let lit = AddressLiteral::parse(&text).expect("rendered address is a literal");
                prop_assert_eq!(lit.ip(), Some(ip));
            }
        }
    }
}
