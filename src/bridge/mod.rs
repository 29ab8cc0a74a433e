//! Bridge client and its internals.
//!
//! # Example
//!
//! ```ignore
//! use js_bridge::BridgeClient;
//! use tokio_util::sync::CancellationToken;
//!
//! let client = BridgeClient::new();
//! client.connect("ws://localhost:8081/debugger-proxy?role=client", &CancellationToken::new()).await?;
//! let queue = client.flushed_queue().await?;
//! ```
//!
//! Correlation is internal to the client:
//!
//! ```compile_fail
//! use js_bridge::bridge::Correlator;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent client configuration |
//! | `core` | [`BridgeClient`] façade |
//! | `correlator` | Request identifiers and pending calls |
//! | `executor` | [`JavaScriptExecutor`] capability trait |
//! | `manager` | Connect, retry, handshake |
//! | `options` | [`BridgeOptions`] |
//! | `state` | [`ConnectionState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

/// Core bridge client implementation.
pub mod core;

/// Request/reply correlation.
pub(crate) mod correlator;

/// Capability interface for collaborators.
pub mod executor;

/// Connection manager.
mod manager;

/// Bridge client options.
pub mod options;

/// Connection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeClientBuilder;
pub use core::BridgeClient;
pub use executor::JavaScriptExecutor;
pub use options::BridgeOptions;
pub use state::ConnectionState;
