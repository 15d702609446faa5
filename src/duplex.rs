//! Paired input/output server (`AsioDuplexServer` in the original): one
//! `SimplexIn` listener on `ports[0]`, one `SimplexOut` listener on
//! `ports[1]`, the same protocol on both, sharing one [`Runtime`]. Each
//! side's callback is configured on its own [`EndpointConfig`] before
//! construction — the builder-style `with_input_callback`/
//! `with_output_callback` pattern already used by [`TcpServer`]/[`UdpServer`]
//! stands in for the original's post-construction `SetCallback(DataType, ...)`
//! call.

use crate::acceptor::TcpServer;
use crate::config::EndpointConfig;
use crate::runtime::Runtime;
use crate::types::{DataType, TransferType};
use crate::udp::UdpServer;

/// Which socket protocol both sides of a [`DuplexServer`] use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplexProtocol {
    Tcp,
    Udp,
}

enum Side {
    Tcp(TcpServer),
    Udp(UdpServer),
}

impl Side {
    fn port(&self) -> u16 {
        match self {
            Self::Tcp(s) => s.port(),
            Self::Udp(s) => s.port(),
        }
    }

    fn sockets_count(&self) -> i32 {
        match self {
            Self::Tcp(s) => s.sockets_count(),
            Self::Udp(s) => s.sockets_count(),
        }
    }

    fn is_listening(&self) -> bool {
        match self {
            Self::Tcp(s) => s.is_listening(),
            Self::Udp(s) => s.is_listening(),
        }
    }
}

/// Two independent simplex servers exposed as one façade. Closing one side's
/// sessions never touches the other's `sockets_count`.
pub struct DuplexServer {
    input: Side,
    output: Side,
}

impl DuplexServer {
    /// `input_config`/`output_config` must carry `ports[0]`/`ports[1]` and
    /// `TransferType::SimplexIn`/`SimplexOut` respectively; panics otherwise,
    /// since a misconfigured duplex pair is a programmer error, not a
    /// runtime condition.
    #[must_use]
    pub fn new(protocol: DuplexProtocol, input_config: EndpointConfig, output_config: EndpointConfig) -> Self {
        Self::with_runtime(protocol, input_config, output_config, Runtime::instance())
    }

    /// Binds both sides' hooks to an explicit runtime instead of the
    /// singleton — for running isolated scenarios side by side, e.g. in
    /// tests.
    #[must_use]
    pub fn with_runtime(
        protocol: DuplexProtocol,
        input_config: EndpointConfig,
        output_config: EndpointConfig,
        runtime: &'static Runtime,
    ) -> Self {
        assert_eq!(
            input_config.transfer_type(),
            TransferType::SimplexIn,
            "DuplexServer's input side must be configured as SimplexIn"
        );
        assert_eq!(
            output_config.transfer_type(),
            TransferType::SimplexOut,
            "DuplexServer's output side must be configured as SimplexOut"
        );

        let (input, output) = match protocol {
            DuplexProtocol::Tcp => (
                Side::Tcp(TcpServer::with_runtime(input_config, runtime)),
                Side::Tcp(TcpServer::with_runtime(output_config, runtime)),
            ),
            DuplexProtocol::Udp => (
                Side::Udp(UdpServer::with_runtime(input_config, runtime)),
                Side::Udp(UdpServer::with_runtime(output_config, runtime)),
            ),
        };

        Self { input, output }
    }

    #[must_use]
    pub fn port(&self, data_type: DataType) -> u16 {
        match data_type {
            DataType::Input => self.input.port(),
            DataType::Output => self.output.port(),
        }
    }

    #[must_use]
    pub fn sockets_count(&self, data_type: DataType) -> i32 {
        match data_type {
            DataType::Input => self.input.sockets_count(),
            DataType::Output => self.output.sockets_count(),
        }
    }

    #[must_use]
    pub fn is_listening(&self, data_type: DataType) -> bool {
        match data_type {
            DataType::Input => self.input.is_listening(),
            DataType::Output => self.output.is_listening(),
        }
    }
}
