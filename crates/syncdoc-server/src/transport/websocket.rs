//! Axum WebSocket adapter.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use syncdoc_core::Message;
use tracing::{debug, trace, warn};

use super::{decode_frame, TransportReader, TransportWriter};
use crate::errors::TransportError;
use crate::metrics::FRAMES_REJECTED_TOTAL;

/// Split an upgraded socket into session transport halves.
pub fn split_socket(socket: WebSocket) -> (WsReader, WsWriter) {
    let (sink, stream) = socket.split();
    (WsReader { stream }, WsWriter { sink })
}

/// Inbound half: decodes text (or UTF-8 binary) frames into envelopes.
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

/// Outbound half: writes envelopes as text frames.
pub struct WsWriter {
    sink: SplitSink<WebSocket, WsMessage>,
}

impl WsWriter {
    /// Send a raw text frame, used before a session exists.
    pub async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(WsMessage::Text(text.to_owned().into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

#[async_trait]
impl TransportReader for WsReader {
    async fn receive(&mut self) -> Result<Option<Message>, TransportError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };
            let frame = frame.map_err(|e| TransportError::Io(e.to_string()))?;
            let decoded = match frame {
                WsMessage::Text(text) => decode_frame(text.as_str().as_bytes()),
                WsMessage::Binary(data) => decode_frame(&data),
                WsMessage::Close(_) => {
                    debug!("peer sent close frame");
                    return Ok(None);
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            };
            match decoded {
                Ok(message) => return Ok(Some(message)),
                Err(error) => {
                    counter!(FRAMES_REJECTED_TOTAL).increment(1);
                    warn!(%error, "dropping undecodable frame");
                }
            }
        }
    }
}

#[async_trait]
impl TransportWriter for WsWriter {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let json = serde_json::to_string(message)?;
        self.send_text(&json).await
    }

    async fn keepalive(&mut self) -> Result<(), TransportError> {
        trace!("sending ping");
        self.sink
            .send(WsMessage::Ping(Bytes::new()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
