//! JavaScript execution bridge client.
//!
//! This library connects native application code to a remote JavaScript
//! execution host (such as a debugger worker) and issues correlated calls
//! over a WebSocket.
//!
//! # Architecture
//!
//! The bridge follows a client-host model:
//!
//! - **Local End (Rust)**: Sends requests, resolves replies by identifier
//! - **Remote End (Script host)**: Runs the bundle, answers each request
//!
//! Key design principles:
//!
//! - One [`BridgeClient`] owns one transport and one correlation table
//! - Replies are matched by `replyID`, never by arrival order
//! - Connect retries a fixed number of times, each attempt time-bounded
//! - Disposal resolves every outstanding call instead of failing it
//!
//! # Quick Start
//!
//! ```no_run
//! use js_bridge::{BridgeClient, Result};
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = BridgeClient::new();
//!     client
//!         .connect("ws://localhost:8081/debugger-proxy?role=client", &CancellationToken::new())
//!         .await?;
//!
//!     client.set_global_variable("__DEV__", &json!(true));
//!     client.run_script("http://localhost:8081/index.bundle").await?;
//!
//!     let queue = client.flushed_queue().await?;
//!     println!("Flushed queue: {}", queue);
//!
//!     client.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`BridgeClient`], correlation, connection management |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Bridge client, correlation, and connection management.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// Transport layer.
///
/// WebSocket connection plus an in-process transport for embedding.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    BridgeClient, BridgeClientBuilder, BridgeOptions, ConnectionState, JavaScriptExecutor,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::RequestId;

// Protocol types
pub use protocol::{InjectedGlobals, Method};

// Transport types
pub use transport::{Connector, MemoryConnector, RemoteEnd, Transport, WebSocketConnector};

// Cancellation input for `connect`
pub use tokio_util::sync::CancellationToken;
