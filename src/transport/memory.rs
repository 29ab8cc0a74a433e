//! In-process transport.
//!
//! [`MemoryConnector`] hands the bridge a [`MemoryTransport`] whose far side
//! is a [`RemoteEnd`]: whatever the bridge sends shows up on the remote end,
//! and whatever the remote end pushes is delivered to the bridge's
//! [`InboundHandler`]. Used to embed a script host in the same process and
//! to drive the bridge in tests.
//!
//! # Example
//!
//! ```ignore
//! let (connector, mut remote) = MemoryConnector::new();
//! let client = BridgeClient::builder().connector(connector).build();
//!
//! tokio::spawn(async move {
//!     while let Some(request) = remote.recv_request().await {
//!         remote.reply(request["id"].as_u64().unwrap_or_default(), json!(null));
//!     }
//! });
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, InboundHandler, Transport};

// ============================================================================
// Shared State
// ============================================================================

/// State shared by the connector, its transports, and the remote end.
#[derive(Default)]
struct Shared {
    /// Handler of the currently open transport.
    handler: Option<Arc<dyn InboundHandler>>,
    /// Whether a transport is open.
    open: bool,
    /// Number of successful opens.
    opens: usize,
    /// Opens still to be refused.
    refuse_opens: usize,
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector producing in-process transports.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl MemoryConnector {
    /// Creates a connector and the remote end it talks to.
    #[must_use]
    pub fn new() -> (Self, RemoteEnd) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let connector = Self {
            shared: Arc::clone(&shared),
            outbound_tx,
        };
        let remote = RemoteEnd {
            shared,
            outbound_rx,
        };

        (connector, remote)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(
        &self,
        url: &Url,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Arc<dyn Transport>> {
        let mut shared = self.shared.lock();

        if shared.refuse_opens > 0 {
            shared.refuse_opens -= 1;
            debug!(url = %url, "Memory open refused");
            return Err(Error::connection(format!("connection refused: {url}")));
        }

        shared.handler = Some(handler);
        shared.open = true;
        shared.opens += 1;

        debug!(url = %url, opens = shared.opens, "Memory transport opened");

        Ok(Arc::new(MemoryTransport {
            shared: Arc::clone(&self.shared),
            outbound_tx: self.outbound_tx.clone(),
        }))
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Bridge side of an in-process channel.
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, text: String) -> Result<()> {
        if !self.shared.lock().open {
            return Err(Error::ConnectionClosed);
        }

        self.outbound_tx
            .send(text)
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let mut shared = self.shared.lock();
        shared.open = false;
        shared.handler = None;
    }
}

// ============================================================================
// RemoteEnd
// ============================================================================

/// Script host side of an in-process channel.
pub struct RemoteEnd {
    shared: Arc<Mutex<Shared>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl RemoteEnd {
    /// Waits for the next message sent by the bridge.
    ///
    /// Returns `None` once every connector and transport is dropped.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Returns a message the bridge already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound_rx.try_recv().ok()
    }

    /// Waits for the next message and parses it as JSON.
    ///
    /// Messages that are not JSON are skipped.
    pub async fn recv_request(&mut self) -> Option<Value> {
        loop {
            let text = self.recv().await?;
            match serde_json::from_str(&text) {
                Ok(value) => return Some(value),
                Err(e) => warn!(error = %e, "Skipping non-JSON outbound message"),
            }
        }
    }

    /// Delivers `text` to the bridge.
    ///
    /// Returns `false` if no transport is open.
    pub fn push(&self, text: impl AsRef<str>) -> bool {
        let handler = {
            let shared = self.shared.lock();
            if !shared.open {
                return false;
            }
            shared.handler.clone()
        };

        match handler {
            Some(handler) => {
                handler.on_message(text.as_ref());
                true
            }
            None => false,
        }
    }

    /// Sends a `{"replyID", "result"}` reply.
    pub fn reply(&self, id: u64, result: Value) -> bool {
        self.push(json!({"replyID": id, "result": result}).to_string())
    }

    /// Sends a reply carrying an `error`.
    pub fn reply_error(&self, id: u64, message: &str) -> bool {
        self.push(json!({"replyID": id, "error": message}).to_string())
    }

    /// Closes the channel from the remote side.
    ///
    /// The bridge is notified through [`InboundHandler::on_closed`].
    pub fn disconnect(&self) {
        let handler = {
            let mut shared = self.shared.lock();
            shared.open = false;
            shared.handler.take()
        };

        if let Some(handler) = handler {
            handler.on_closed();
        }
    }

    /// Refuses the next `count` open attempts.
    pub fn refuse_opens(&self, count: usize) {
        self.shared.lock().refuse_opens = count;
    }

    /// Returns the number of successful opens so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.shared.lock().opens
    }

    /// Returns `true` while a transport is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }
}

// ============================================================================
// Tests
// ============================================================================
