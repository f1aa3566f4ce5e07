//! Session transport seam.
//!
//! A session only sees a [`TransportReader`] yielding decoded envelopes and a
//! [`TransportWriter`] accepting envelopes to send. The WebSocket adapter
//! backs real connections; the channel adapter backs in-process peers.

pub mod channel;
pub mod websocket;

use async_trait::async_trait;
use syncdoc_core::Message;

use crate::errors::TransportError;

pub use channel::{channel_pair, ChannelPeer, ChannelReader, ChannelWriter};
pub use websocket::{split_socket, WsReader, WsWriter};

/// Inbound half of a session's duplex channel.
#[async_trait]
pub trait TransportReader: Send {
    /// Next decoded envelope; `Ok(None)` once the peer has closed.
    async fn receive(&mut self) -> Result<Option<Message>, TransportError>;
}

/// Outbound half of a session's duplex channel.
#[async_trait]
pub trait TransportWriter: Send {
    /// Serialize and write one envelope.
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Liveness probe sent on the ping interval.
    async fn keepalive(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Best-effort close once the session has ended.
    async fn close(&mut self) {}
}

/// Decode one inbound frame into an envelope.
pub fn decode_frame(frame: &[u8]) -> Result<Message, serde_json::Error> {
    serde_json::from_slice(frame)
}
