//! Error taxonomy for the connection driver and configuration layer.

use std::fmt;

/// Upper bound on the number of engine reasons carried by a single [`ErrorDetail`].
///
/// When more reasons are queued during one engine call, the oldest are dropped.
pub const MAX_QUEUED_REASONS: usize = 16;

/// Reason the engine gave for a call that made no progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No reason was recorded.
    None,
    /// The engine needs more inbound ciphertext.
    WantRead,
    /// The engine could not write to the transport.
    WantWrite,
    /// The peer closed the TLS session cleanly with close_notify.
    ZeroReturn,
    /// The transport failed or ended without a close_notify.
    Syscall,
    /// Protocol, certificate or alert failure inside the engine.
    Ssl,
}

impl ErrorCode {
    /// Whether this code means "retry after more I/O" rather than failure.
    pub fn is_would_block(self) -> bool {
        matches!(self, ErrorCode::WantRead | ErrorCode::WantWrite)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::None => "none",
            ErrorCode::WantRead => "want read",
            ErrorCode::WantWrite => "want write",
            ErrorCode::ZeroReturn => "zero return",
            ErrorCode::Syscall => "syscall",
            ErrorCode::Ssl => "ssl",
        };
        f.write_str(name)
    }
}

/// One entry drained from the engine's error queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorReason(String);

impl ErrorReason {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorReason(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ErrorReason {
    fn from(message: String) -> Self {
        ErrorReason(message)
    }
}

impl From<&str> for ErrorReason {
    fn from(message: &str) -> Self {
        ErrorReason(message.to_string())
    }
}

/// Structured detail of a failed engine call: the reason code plus every
/// reason the engine queued while handling that call, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub reasons: Vec<ErrorReason>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.reasons.is_empty() {
            let reasons: Vec<&str> = self.reasons.iter().map(ErrorReason::message).collect();
            write!(f, " [{}]", reasons.join("; "))?;
        }
        Ok(())
    }
}

/// Failure of a driver operation. Would-block conditions never appear here;
/// they are reported as `OperationResult::Incomplete`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlsError {
    #[error("invalid SNI name: {0}")]
    InvalidSniName(String),

    #[error("TLS engine error: {0}")]
    Engine(ErrorDetail),
}

impl TlsError {
    /// The engine detail, if this failure came from the engine.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            TlsError::Engine(detail) => Some(detail),
            TlsError::InvalidSniName(_) => None,
        }
    }

    /// Whether the peer closed the session cleanly.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, TlsError::Engine(detail) if detail.code == ErrorCode::ZeroReturn)
    }
}

/// Errors building a configuration or a context from one.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ALPN protocol name is {0} bytes long, the limit is 255")]
    AlpnProtocolTooLong(usize),

    #[error("ALPN protocol name must not be empty")]
    EmptyAlpnProtocol,

    #[error("malformed ALPN protocol list: {0}")]
    MalformedAlpnList(String),

    #[error("unknown cipher suite: {0}")]
    UnknownCipherSuite(String),

    #[error("none of the requested cipher suites are supported")]
    NoCipherSuites,

    #[error("no supported protocol version between the configured minimum and maximum")]
    NoProtocolVersions,

    #[error("certificate chain and private key must be configured together")]
    IncompleteIdentity,

    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("certificate verifier error: {0}")]
    Verifier(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_codes() {
        assert!(ErrorCode::WantRead.is_would_block());
        assert!(ErrorCode::WantWrite.is_would_block());
        assert!(!ErrorCode::Ssl.is_would_block());
        assert!(!ErrorCode::ZeroReturn.is_would_block());
    }

    #[test]
    fn test_detail_display_lists_reasons() {
        let detail = ErrorDetail {
            code: ErrorCode::Ssl,
            reasons: vec!["bad record mac".into(), "alert sent".into()],
        };
        assert_eq!(detail.to_string(), "ssl [bad record mac; alert sent]");
    }

    #[test]
    fn test_clean_close() {
        let err = TlsError::Engine(ErrorDetail {
            code: ErrorCode::ZeroReturn,
            reasons: vec![],
        });
        assert!(err.is_clean_close());
        assert!(!TlsError::InvalidSniName("x".into()).is_clean_close());
    }
}
