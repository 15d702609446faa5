/// Transit Error Types
///
/// Error handling for all Transit operations.
use std::io;
use thiserror::Error;

/// Main error type for Transit operations
#[derive(Error, Debug)]
pub enum TransitError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration (empty host/service, zero port, `FullDuplex`
    /// requested at the session level, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `IncSocketsCount` would exceed `sockets_limit`
    #[error("Socket count limit reached")]
    SocketLimit,

    /// A resolve attempt produced no endpoints for the given host/service
    #[error("No endpoints resolved for {0}")]
    NoEndpoints(String),

    /// The packet framer's stuffing rule table is empty or not self-disjoint
    #[error("Invalid packet framer configuration: {0}")]
    InvalidFramerConfig(String),

    /// Socket closed before the requested operation completed
    #[error("Socket closed")]
    SocketClosed,

    /// An operation was cancelled, typically by deadline expiry or `stop()`
    #[error("Operation canceled")]
    OperationCanceled,
}

/// Result type alias for Transit operations
pub type Result<T> = std::result::Result<T, TransitError>;

impl TransitError {
    /// Create a configuration error with a message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid framer configuration error
    pub fn invalid_framer_config(msg: impl Into<String>) -> Self {
        Self::InvalidFramerConfig(msg.into())
    }

    /// True for errors that close a single session/acceptor/connector
    /// attempt without implying the whole runtime should stop.
    #[must_use]
    pub const fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::SocketClosed | Self::OperationCanceled | Self::SocketLimit
        )
    }
}

/// Reduced error-code surface mirroring the original's narrow use of
/// `boost::system::errc::errc_t`, for the [`ErrorRegistry`](crate::error_registry::ErrorRegistry)
/// callback dispatch mechanism. This is a coarser *classification* of what
/// failed, independent of [`TransitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error.
    Success,
    /// An uncaught failure inside a session coroutine; triggers the
    /// default `Runtime::stop()` policy.
    OwnerDead,
    /// A pending operation was cancelled (deadline stop, explicit `stop()`).
    OperationCanceled,
    /// A connect attempt was refused by the peer.
    ConnectionRefused,
    /// An operation exceeded its configured deadline.
    TimedOut,
    /// Any other I/O-classified failure, tagged with its originating kind.
    Other(io::ErrorKind),
}

impl ErrorCode {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::TimedOut => Self::TimedOut,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::OwnerDead => write!(f, "owner dead"),
            Self::OperationCanceled => write!(f, "operation canceled"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Other(kind) => write!(f, "{kind:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::OwnerDead.is_success());
    }

    #[test]
    fn io_error_classification() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(ErrorCode::from_io_error(&err), ErrorCode::ConnectionRefused);

        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(ErrorCode::from_io_error(&err), ErrorCode::TimedOut);

        let err = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(
            ErrorCode::from_io_error(&err),
            ErrorCode::Other(io::ErrorKind::NotFound)
        );
    }

    #[test]
    fn session_scoped_classification() {
        assert!(TransitError::SocketClosed.is_session_scoped());
        assert!(!TransitError::configuration("bad host").is_session_scoped());
    }
}
