use std::fmt;
use std::net::IpAddr;

/// Error raised while loading or validating configuration.
///
/// Configuration errors are fatal to startup. They never occur while a
/// request is being processed.
///
/// # Examples
///
/// ```
/// use proxy_identity::{ConfigErrorKind, ProxyTrustSet};
///
/// let mut trust = ProxyTrustSet::new();
/// let err = trust.add("10.0.0.0/33").unwrap_err();
/// assert_eq!(err.kind(), ConfigErrorKind::InvalidPrefixLength);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Kind of configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A trusted network literal was empty.
    Empty,
    /// A trusted network literal contains characters outside its family's set.
    InvalidCharacters,
    /// A prefix length is missing, malformed, or too wide for the family.
    InvalidPrefixLength,
    /// The base address of a trusted network could not be parsed.
    InvalidAddress,
    /// The forwarded-chain header name is not a valid HTTP token.
    InvalidHeaderName,
    /// The configuration document could not be deserialized.
    Parse,
    /// The configuration file could not be read.
    Io,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty literal"),
            Self::InvalidCharacters => write!(f, "invalid characters"),
            Self::InvalidPrefixLength => write!(f, "invalid prefix length"),
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::InvalidHeaderName => write!(f, "invalid header name"),
            Self::Parse => write!(f, "parse error"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

/// Resolution failed because the forwarded chain held no candidates.
///
/// Callers must leave the request's identity untouched when they see this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoCandidate;

impl fmt::Display for NoCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forwarded chain contains no candidate address")
    }
}

impl std::error::Error for NoCandidate {}

/// The immediate peer is not a trusted proxy and the gate is configured to
/// reject such requests.
///
/// Hosts typically map this to `403 Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forbidden {
    /// Address of the untrusted peer.
    pub peer: IpAddr,
}

impl fmt::Display for Forbidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer {} is not a trusted proxy", self.peer)
    }
}

impl std::error::Error for Forbidden {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_kind() {
        let err = ConfigError::new(ConfigErrorKind::InvalidAddress, "10.0.0.256");
        assert_eq!(
            err.to_string(),
            "configuration error (invalid address): 10.0.0.256"
        );
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAddress);
        assert_eq!(err.message(), "10.0.0.256");
    }

    #[test]
    fn forbidden_names_the_peer() {
        let err = Forbidden {
            peer: "198.51.100.7".parse().unwrap(),
        };
        assert_eq!(err.to_string(), "peer 198.51.100.7 is not a trusted proxy");
    }

    #[test]
    fn no_candidate_is_an_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&NoCandidate);
    }
}
