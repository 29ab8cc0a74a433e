//! Client-visible connection state.

use std::fmt;

use parking_lot::Mutex;

use crate::error::{Error, Result};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle of a [`BridgeClient`](super::BridgeClient).
///
/// ```text
/// Disconnected → Connecting → Handshaking → Ready → Disposed
/// ```
///
/// `Disposed` is terminal and reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for `prepareJSRuntime`.
    Handshaking,
    /// Accepting calls.
    Ready,
    /// Torn down.
    Disposed,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Ready`].
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Returns `true` for [`ConnectionState::Disposed`].
    #[inline]
    #[must_use]
    pub fn is_disposed(self) -> bool {
        self == Self::Disposed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// StateCell
// ============================================================================

/// Shared [`ConnectionState`] that never leaves `Disposed`.
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<ConnectionState>);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(Mutex::new(ConnectionState::Disconnected))
    }

    #[inline]
    pub(crate) fn get(&self) -> ConnectionState {
        *self.0.lock()
    }

    /// Moves to `next` unless disposed.
    pub(crate) fn advance(&self, next: ConnectionState) -> Result<()> {
        let mut state = self.0.lock();
        if state.is_disposed() {
            return Err(Error::Disposed);
        }
        *state = next;
        Ok(())
    }

    /// Moves to `Disposed`. Returns `false` if already there.
    pub(crate) fn dispose(&self) -> bool {
        let mut state = self.0.lock();
        if state.is_disposed() {
            return false;
        }
        *state = ConnectionState::Disposed;
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
