//! Bridge client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use js_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_connect_timeout(Duration::from_secs(2))
//!     .with_connect_retries(5);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for one connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default number of connection attempts.
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;

// ============================================================================
// BridgeOptions
// ============================================================================

/// Connection options for a [`BridgeClient`](super::BridgeClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Upper bound on one attempt: opening the transport plus handshake.
    pub connect_timeout: Duration,

    /// Total attempts before `connect` gives up. At least 1.
    pub connect_retries: u32,
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with the default timeout and retry budget.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_retries: DEFAULT_CONNECT_RETRIES,
        }
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the per-attempt timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the number of attempts, clamped to at least 1.
    #[inline]
    #[must_use]
    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = retries.max(1);
        self
    }

    /// Per-attempt timeout in whole milliseconds.
    #[inline]
    #[must_use]
    pub fn connect_timeout_ms(&self) -> u64 {
        u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// Tests
// ============================================================================
