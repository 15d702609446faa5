//! transit
//!
//! An asynchronous TCP/UDP transport framework built on `compio`: session
//! state machines for simplex, half-duplex, and full-duplex-by-composition
//! streaming, a byte-stuffing packet framer, a bounded-concurrency acceptor
//! and connector, a paired duplex server, and a single process-wide
//! cooperative runtime that ties their lifecycles together.
//!
//! - `runtime` — the process-wide dispatcher and lifecycle hooks
//! - `session` — the per-socket Receive/Send/HalfDuplex state machine
//! - `acceptor` — bounded-concurrency TCP accept loop (`TcpServer`)
//! - `connector` — outbound connect with optional keep-alive
//! - `udp` — single-session datagram listener (`UdpServer`)
//! - `duplex` — paired simplex-in/simplex-out façade (`DuplexServer`)
//! - `framer` — byte-stuffing codec and packet extraction
//! - `channel`, `buffer` — per-direction I/O staging
//! - `resolver` — host+service to endpoint-list resolution
//! - `timer`, `timeout` — deadline bookkeeping and timeout-wrapped I/O
//! - `config` — builder-style endpoint/connector configuration
//! - `error`, `error_registry` — error types and callback dispatch
//! - `types` — shared enums (`TransferType`, `DataType`, `RuntimeState`)

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod acceptor;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod connector;
pub mod dev_tracing;
pub mod duplex;
pub mod error;
pub mod error_registry;
pub mod framer;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod tcp;
pub mod timeout;
pub mod timer;
pub mod types;
pub mod udp;

pub mod prelude {
    pub use crate::acceptor::TcpServer;
    pub use crate::buffer::ByteBuffer;
    pub use crate::channel::IoChannel;
    pub use crate::config::{ConnectorConfig, EndpointConfig, ServiceTimeout};
    pub use crate::connector::Connector;
    pub use crate::duplex::{DuplexProtocol, DuplexServer};
    pub use crate::error::{ErrorCode, Result, TransitError};
    pub use crate::framer::{PacketFramer, StuffingRule};
    pub use crate::resolver::Resolver;
    pub use crate::runtime::{HookKind, Runtime};
    pub use crate::session::{Session, SessionSocket};
    pub use crate::timer::DeadlineTimer;
    pub use crate::types::{DataType, RuntimeState, TransferType};
    pub use crate::udp::UdpServer;
}
