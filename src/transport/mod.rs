//! Message transport layer.
//!
//! This module abstracts the bidirectional text channel between the bridge
//! (Rust) and the remote script host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  BridgeClient   │                              │  Script Host    │
//! │                 │         WebSocket            │  (debugger      │
//! │  Connector      │─────────────────────────────►│   worker)       │
//! │  → Transport    │◄─────────────────────────────│                 │
//! │  → Handler      │       ws://host:port         │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`Connector::open`] - Open the channel, register an [`InboundHandler`]
//! 2. [`Transport::send`] - Write request text
//! 3. [`InboundHandler::on_message`] - Called once per inbound text message
//! 4. [`InboundHandler::on_closed`] - Called if the remote end goes away
//! 5. [`Transport::close`] - Local teardown (no `on_closed` callback)
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `memory` | In-process transport paired with a [`RemoteEnd`] |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// In-process transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, WebSocketConnector};
pub use memory::{MemoryConnector, MemoryTransport, RemoteEnd};

// ============================================================================
// Traits
// ============================================================================

/// Receiver of inbound transport events.
///
/// Implementations must not block: both methods run on the transport's
/// reader.
pub trait InboundHandler: Send + Sync {
    /// Handles one inbound text message.
    fn on_message(&self, text: &str);

    /// The remote end closed the channel or it failed.
    fn on_closed(&self);
}

/// An open channel to the script host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the channel is gone, or the underlying write error.
    async fn send(&self, text: String) -> Result<()>;

    /// Closes the channel. Idempotent.
    fn close(&self);
}

/// Factory that opens a [`Transport`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a channel to `url`, delivering inbound events to `handler`.
    async fn open(&self, url: &Url, handler: Arc<dyn InboundHandler>)
    -> Result<Arc<dyn Transport>>;
}
