//! Socket seam. The runtime only sees text frames in and out plus a closure event.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::connection::CloseReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(String),
    Closed(CloseReason),
}

/// One live connection. Dropping `outbound` closes the socket.
pub struct TransportChannel {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportChannel>;
}

pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportChannel> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    warn!("websocket send failed: {err}");
                    break;
                }
            }
            let _ = ws_writer.close().await;
            debug!("websocket writer finished");
        });

        tokio::spawn(async move {
            let reason = loop {
                match ws_reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Remote,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break CloseReason::Error(err.to_string()),
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed(reason));
        });

        Ok(TransportChannel { outbound, inbound })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
