//! Walking a forwarded chain back to the client.

use std::net::IpAddr;

use crate::chain::CandidateChain;
use crate::error::NoCandidate;
use crate::literal::AddressLiteral;
use crate::trust::ProxyTrustSet;

/// The outcome of resolving a forwarded chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    client: AddressLiteral,
    proxies: Vec<AddressLiteral>,
    source: String,
}

impl ResolvedIdentity {
    /// Returns the address determined to be the real client.
    pub fn client_address(&self) -> &AddressLiteral {
        &self.client
    }

    /// Returns the trusted hops skipped during resolution, nearest first.
    pub fn proxy_chain(&self) -> &[AddressLiteral] {
        &self.proxies
    }

    /// Returns the header value the identity was resolved from.
    pub fn source_header_value(&self) -> &str {
        &self.source
    }

    /// Returns the number of forwarded hops skipped.
    pub fn hops(&self) -> usize {
        self.proxies.len()
    }

    /// Renders the full proxy path as seen from this server: the immediate
    /// peer followed by every skipped hop, nearest first.
    ///
    /// # Examples
    ///
    /// ```
    /// use proxy_identity::{resolve, CandidateChain, ProxyTrustSet};
    ///
    /// let trust = ProxyTrustSet::from_literals(["10.0.0.0/8"]).unwrap();
    /// let chain = CandidateChain::parse("198.51.100.4, 10.0.0.2");
    /// let identity = resolve(&chain, &trust).unwrap();
    ///
    /// assert_eq!(identity.proxy_list("10.0.0.1".parse().unwrap()), "10.0.0.1, 10.0.0.2");
    /// ```
    pub fn proxy_list(&self, peer: IpAddr) -> String {
        let mut list = peer.to_string();
        for hop in &self.proxies {
            list.push_str(", ");
            list.push_str(hop.as_str());
        }
        list
    }
}

/// Resolves the real client address from a forwarded chain.
///
/// The chain is scanned from the rightmost (nearest) entry toward the left.
/// Entries that are valid addresses inside `trust` are skipped as proxy hops;
/// the first entry that is either not a valid address or not trusted is the
/// client. When every entry is trusted the leftmost entry, the hop nearest
/// the origin, is taken as the client.
///
/// # Errors
///
/// Returns [`NoCandidate`] when the chain is empty.
///
/// # Examples
///
/// ```
/// use proxy_identity::{resolve, CandidateChain, ProxyTrustSet};
///
/// let trust = ProxyTrustSet::from_literals(["10.0.0.0/8"]).unwrap();
/// let chain = CandidateChain::parse("203.0.113.5, 10.1.2.3, 10.5.6.7");
///
/// let identity = resolve(&chain, &trust).unwrap();
/// assert_eq!(identity.client_address().as_str(), "203.0.113.5");
///
/// let skipped: Vec<&str> = identity.proxy_chain().iter().map(|hop| hop.as_str()).collect();
/// assert_eq!(skipped, ["10.5.6.7", "10.1.2.3"]);
/// ```
pub fn resolve(chain: &CandidateChain, trust: &ProxyTrustSet) -> Result<ResolvedIdentity, NoCandidate> {
    let (leftmost, rest) = chain.entries().split_first().ok_or(NoCandidate)?;

    let mut proxies = Vec::new();
    for entry in rest.iter().rev() {
        if !is_trusted_hop(entry, trust) {
            return Ok(identity(chain, entry.clone(), proxies));
        }
        proxies.push(entry.clone());
    }

    // Every entry right of the leftmost was a trusted hop; the leftmost is
    // the client whether or not it is trusted itself.
    Ok(identity(chain, leftmost.clone(), proxies))
}

fn is_trusted_hop(entry: &AddressLiteral, trust: &ProxyTrustSet) -> bool {
    entry.ip().is_some_and(|ip| trust.contains(ip))
}

fn identity(
    chain: &CandidateChain,
    client: AddressLiteral,
    proxies: Vec<AddressLiteral>,
) -> ResolvedIdentity {
    ResolvedIdentity {
        client,
        proxies,
        source: chain.source().to_string(),
    }
}
