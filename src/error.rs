use std::path::PathBuf;
use thiserror::Error;

/// Reasons a benchmark cannot start
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no targets specified: provide a URL or a URL file")]
    NoTargets,
    #[error("requests or period must be provided")]
    MissingLimit,
    #[error("only one should be provided: [requests|period]")]
    ConflictingLimits,
    #[error("number of clients must be at least 1")]
    ZeroConcurrency,
    #[error("number of requests per client must be at least 1")]
    ZeroRequests,
    #[error("invalid target {uri}: {reason}")]
    InvalidTarget { uri: String, reason: String },
    #[error("failed to read URL file {path}")]
    ReadTargets {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read body file {path}")]
    ReadBody {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure TLS")]
    Tls(#[from] rustls::Error),
}

/// A request that failed before a complete response was read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(value: std::io::Error) -> Self {
        TransportError(value.to_string())
    }
}

impl From<hyper::Error> for TransportError {
    fn from(value: hyper::Error) -> Self {
        TransportError(value.to_string())
    }
}
