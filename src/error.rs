//! Error types for the JavaScript bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use js_bridge::{BridgeClient, Result};
//!
//! async fn example(client: &BridgeClient) -> Result<()> {
//!     let queue = client.flushed_queue().await?;
//!     println!("{queue}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::InvalidAddress`], [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::ConnectFailed`] |
//! | Lifecycle | [`Error::Cancelled`], [`Error::Disposed`], [`Error::NotConnected`] |
//! | Call | [`Error::Script`], [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |
//!
//! Call errors reach the caller as the root variant. Nothing in the crate
//! wraps the error a remote call produced.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Remote host address is malformed.
    ///
    /// Returned by `connect` before any attempt is made.
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why the address was rejected.
        message: String,
    },

    /// Transport connection failed.
    ///
    /// Returned when the channel to the script host cannot be opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A single connection attempt exceeded its timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transport closed while a call was waiting.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Every connection attempt failed.
    ///
    /// Carries the error from the final attempt.
    #[error("Connect failed after {attempts} attempts: {source}")]
    ConnectFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the last attempt.
        #[source]
        source: Box<Error>,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// External cancellation fired during connect.
    #[error("Operation cancelled")]
    Cancelled,

    /// Client was disposed.
    ///
    /// Only `connect` reports this; calls after disposal resolve to null.
    #[error("Bridge client disposed")]
    Disposed,

    /// A call was issued before `connect` completed.
    #[error("Bridge client not connected (state: {state})")]
    NotConnected {
        /// State the client was in.
        state: String,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// The script host replied with an error.
    #[error("Script error: {message}")]
    Script {
        /// Error message from the script host.
        message: String,
    },

    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a retries-exhausted error around the last attempt's failure.
    #[inline]
    pub fn connect_failed(attempts: u32, last: Error) -> Self {
        Self::ConnectFailed {
            attempts,
            source: Box::new(last),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: impl ToString) -> Self {
        Self::NotConnected {
            state: state.to_string(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    ///
    /// Looks through [`Error::ConnectFailed`] at the last attempt.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. } => true,
            Self::ConnectFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a cancellation error.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::ConnectFailed { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came back from a remote call.
    #[inline]
    #[must_use]
    pub fn is_call_error(&self) -> bool {
        matches!(
            self,
            Self::Script { .. } | Self::ConnectionClosed | Self::ChannelClosed(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_connect_failed_display_names_last_error() {
        let err = Error::connect_failed(3, Error::connection_timeout(5000));
        assert_eq!(
            err.to_string(),
            "Connect failed after 3 attempts: Connection timeout after 5000ms"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(Error::connect_failed(3, Error::connection_timeout(5000)).is_timeout());
        assert!(!Error::connect_failed(3, Error::connection("refused")).is_timeout());
        assert!(!Error::Cancelled.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("x").is_connection_error());
        assert!(Error::invalid_address("nope", "relative URL").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::script("boom").is_connection_error());
        assert!(!Error::Cancelled.is_connection_error());
    }

    #[test]
    fn test_is_call_error() {
        assert!(Error::script("TypeError").is_call_error());
        assert!(Error::ConnectionClosed.is_call_error());
        assert!(!Error::Cancelled.is_call_error());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = Error::connect_failed(2, Error::connection("refused"));
        let source = err.source().expect("has source");
        assert_eq!(source.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
