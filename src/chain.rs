//! Parsing forwarded-for chains.

use crate::literal::AddressLiteral;

/// The address-like tokens of one forwarded-for header value.
///
/// Tokens keep the header's left-to-right order: the leftmost entry is the
/// hop furthest from this server, the rightmost the one appended by the
/// nearest proxy. Parsing is tolerant; anything that does not look like an
/// address is skipped rather than failing the whole header.
///
/// # Examples
///
/// ```
/// use proxy_identity::CandidateChain;
///
/// let chain = CandidateChain::parse("203.0.113.5, unknown,, 10.1.2.3 ,");
/// let tokens: Vec<&str> = chain.iter().map(|lit| lit.as_str()).collect();
/// assert_eq!(tokens, ["203.0.113.5", "10.1.2.3"]);
/// assert_eq!(chain.source(), "203.0.113.5, unknown,, 10.1.2.3 ,");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateChain {
    source: String,
    entries: Vec<AddressLiteral>,
}

impl CandidateChain {
    /// Splits a header value on commas and keeps the address-like tokens.
    ///
    /// Each token is trimmed; empty tokens (from trailing or repeated commas)
    /// are discarded, as are tokens whose characters do not fit an address
    /// family. An empty result is valid.
    pub fn parse(value: &str) -> Self {
        let entries = value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| {
                let literal = AddressLiteral::parse(token);
                if literal.is_none() {
                    tracing::trace!(token, "dropping non-address forwarded token");
                }
                literal
            })
            .collect();

        Self {
            source: value.to_string(),
            entries,
        }
    }

    /// Parses an optional header value; an absent header yields an empty chain.
    pub fn from_header(value: Option<&str>) -> Self {
        value.map(Self::parse).unwrap_or_default()
    }

    /// Returns the header value the chain was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the tokens, leftmost first.
    pub fn entries(&self) -> &[AddressLiteral] {
        &self.entries
    }

    /// Iterates over the tokens, leftmost first.
    pub fn iter(&self) -> std::slice::Iter<'_, AddressLiteral> {
        self.entries.iter()
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no address-like tokens were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the tokens back into a normalized `", "`-separated value.
    pub fn to_header_value(&self) -> String {
        self.entries
            .iter()
            .map(AddressLiteral::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a CandidateChain {
    type Item = &'a AddressLiteral;
    type IntoIter = std::slice::Iter<'a, AddressLiteral>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
