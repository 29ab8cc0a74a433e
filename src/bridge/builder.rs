//! Builder pattern for bridge client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use js_bridge::{BridgeClient, BridgeOptions};
//!
//! let client = BridgeClient::builder()
//!     .options(BridgeOptions::new().with_connect_retries(5))
//!     .connect_timeout(Duration::from_secs(2))
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{Connector, WebSocketConnector};

use super::core::BridgeClient;
use super::options::BridgeOptions;

// ============================================================================
// BridgeClientBuilder
// ============================================================================

/// Builder for configuring a [`BridgeClient`].
///
/// Use [`BridgeClient::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct BridgeClientBuilder {
    /// Connection options.
    options: BridgeOptions,
    /// Transport factory; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
}

// ============================================================================
// BridgeClientBuilder Implementation
// ============================================================================

impl BridgeClientBuilder {
    /// Creates a builder with default options and WebSocket transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the per-attempt connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_connect_timeout(timeout);
        self
    }

    /// Sets the number of connect attempts.
    #[inline]
    #[must_use]
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.options = self.options.with_connect_retries(retries);
        self
    }

    /// Uses `connector` to open transports.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the client. Nothing is opened until `connect`.
    #[must_use]
    pub fn build(self) -> BridgeClient {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));

        BridgeClient::from_parts(self.options, connector)
    }
}

impl fmt::Debug for BridgeClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClientBuilder")
            .field("options", &self.options)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bridge::ConnectionState;
    use crate::transport::MemoryConnector;

    #[test]
    fn test_builder_defaults() {
        let builder = BridgeClientBuilder::new();
        assert_eq!(builder.options, BridgeOptions::default());
        assert!(builder.connector.is_none());
    }

    #[test]
    fn test_builder_overrides_options() {
        let builder = BridgeClient::builder()
            .connect_timeout(Duration::from_millis(100))
            .connect_retries(0);

        assert_eq!(builder.options.connect_timeout, Duration::from_millis(100));
        assert_eq!(builder.options.connect_retries, 1);
    }

    #[test]
    fn test_build_starts_disconnected() {
        let (connector, remote) = MemoryConnector::new();
        let client = BridgeClient::builder().connector(connector).build();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.pending_count(), 0);
        assert_eq!(remote.open_count(), 0);
    }
}
