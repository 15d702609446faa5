//! Shared enums from the data model: transfer direction, channel index, and
//! the observable runtime status surface.

use std::fmt;

/// Selects a [`Session`](crate::session::Session)'s coroutine composition.
///
/// `FullDuplex` is never assigned to a single session — it is expressed by
/// pairing one `SimplexIn` session with one `SimplexOut` session, which is
/// what [`DuplexServer`](crate::duplex::DuplexServer) does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferType {
    SimplexIn,
    SimplexOut,
    HalfDuplexIn,
    HalfDuplexOut,
    FullDuplex,
}

impl TransferType {
    #[must_use]
    pub const fn is_half_duplex(&self) -> bool {
        matches!(self, Self::HalfDuplexIn | Self::HalfDuplexOut)
    }

    #[must_use]
    pub const fn is_simplex(&self) -> bool {
        matches!(self, Self::SimplexIn | Self::SimplexOut)
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SimplexIn => "simplex-in",
            Self::SimplexOut => "simplex-out",
            Self::HalfDuplexIn => "half-duplex-in",
            Self::HalfDuplexOut => "half-duplex-out",
            Self::FullDuplex => "full-duplex",
        };
        f.write_str(s)
    }
}

/// Index into a [`Session`](crate::session::Session)'s two `IoChannel`s.
/// Exactly two channels exist per endpoint: `Input` and `Output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Input = 0,
    Output = 1,
}

/// Observable status code surface. Only the [`Runtime`] mutates this; every
/// other component reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuntimeState {
    #[default]
    Unknown,
    Ok,
    Exception,
    ErrPortCount,
    ErrChannelId,
    ErrSocketCount,
    ErrConnection,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Exception => "exception",
            Self::ErrPortCount => "err-port-count",
            Self::ErrChannelId => "err-channel-id",
            Self::ErrSocketCount => "err-socket-count",
            Self::ErrConnection => "err-connection",
        };
        f.write_str(s)
    }
}
