//! In-process transport over `mpsc` channels.

use async_trait::async_trait;
use syncdoc_core::Message;
use tokio::sync::mpsc;

use super::{TransportReader, TransportWriter};
use crate::errors::TransportError;

/// Session-side inbound half.
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<Message>,
}

/// Session-side outbound half.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: mpsc::Sender<Message>,
}

/// The far end: what a client would hold.
#[derive(Debug)]
pub struct ChannelPeer {
    /// Messages to the session.
    pub outgoing: mpsc::Sender<Message>,
    /// Messages from the session.
    pub incoming: mpsc::Receiver<Message>,
}

/// Build a connected reader/writer pair plus the peer end.
///
/// Dropping `ChannelPeer::outgoing` closes the session's receive side;
/// dropping `ChannelPeer::incoming` makes the session's writes fail.
pub fn channel_pair(capacity: usize) -> (ChannelReader, ChannelWriter, ChannelPeer) {
    let (to_session, from_peer) = mpsc::channel(capacity.max(1));
    let (to_peer, from_session) = mpsc::channel(capacity.max(1));
    (
        ChannelReader { rx: from_peer },
        ChannelWriter { tx: to_peer },
        ChannelPeer {
            outgoing: to_session,
            incoming: from_session,
        },
    )
}

#[async_trait]
impl TransportReader for ChannelReader {
    async fn receive(&mut self) -> Result<Option<Message>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl TransportWriter for ChannelWriter {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }
}
