//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to the script host.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming text messages, handed to the [`InboundHandler`]
//! - Outgoing requests from the bridge
//! - Shutdown on local close
//!
//! Correlation is not done here; the loop only moves text.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, trace};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, InboundHandler, Transport};

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a text frame and report the outcome.
    Send {
        text: String,
        sent_tx: oneshot::Sender<Result<()>>,
    },
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the script host.
///
/// The connection spawns an internal event loop task which owns the socket.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new<S>(ws_stream: WebSocketStream<S>, handler: Arc<dyn InboundHandler>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, handler));

        Self { command_tx }
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        handler: Arc<dyn InboundHandler>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut closed_locally = false;

        loop {
            tokio::select! {
                // Incoming messages from the script host
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Message received");
                            handler.on_message(&text);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { text, sent_tx }) => {
                            let len = text.len();
                            let outcome = ws_write
                                .send(Message::Text(text.into()))
                                .await
                                .map_err(Error::from);

                            match &outcome {
                                Ok(()) => trace!(len, "Message sent"),
                                Err(e) => error!(error = %e, "Failed to send message"),
                            }

                            let _ = sent_tx.send(outcome);
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            closed_locally = true;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            closed_locally = true;
                            break;
                        }
                    }
                }
            }
        }

        if !closed_locally {
            handler.on_closed();
        }

        debug!("Event loop terminated");
    }
}

#[async_trait]
impl Transport for Connection {
    async fn send(&self, text: String) -> Result<()> {
        let (sent_tx, sent_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { text, sent_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        sent_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(
        &self,
        url: &Url,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Arc<dyn Transport>> {
        debug!(url = %url, "Opening WebSocket");

        let (ws_stream, response) = connect_async(url.as_str()).await?;

        debug!(url = %url, status = %response.status(), "WebSocket connected");

        Ok(Arc::new(Connection::new(ws_stream, handler)))
    }
}

// ============================================================================
// Tests
// ============================================================================
