//! Connection manager.
//!
//! Drives the [`ConnectionState`] machine: opens the transport, performs
//! the `prepareJSRuntime` handshake, and retries within a fixed budget.
//!
//! # Attempt
//!
//! 1. Open the transport unless one is already open (reused across retries)
//! 2. Send `prepareJSRuntime` and wait for its reply
//!
//! Each attempt is bounded by [`BridgeOptions::connect_timeout`]. External
//! cancellation ends `connect` at once with [`Error::Cancelled`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Method, Request};
use crate::transport::{Connector, InboundHandler, Transport};

use super::correlator::Correlator;
use super::options::BridgeOptions;
use super::state::{ConnectionState, StateCell};

/// Builds the inbound handler for the transport opened as a given epoch.
pub(crate) type HandlerFactory = dyn Fn(u64) -> Arc<dyn InboundHandler> + Send + Sync;

// ============================================================================
// ConnectionManager
// ============================================================================

/// The current transport and the epoch it was opened as.
struct Installed {
    epoch: u64,
    transport: Arc<dyn Transport>,
}

/// Owns the transport and the connection state.
pub(crate) struct ConnectionManager {
    options: BridgeOptions,
    connector: Arc<dyn Connector>,
    state: StateCell,
    transport: RwLock<Option<Installed>>,
    /// Last epoch handed to an opened transport.
    epochs: AtomicU64,
    /// Serializes concurrent `connect` calls.
    connect_lock: AsyncMutex<()>,
}

impl ConnectionManager {
    pub(crate) fn new(options: BridgeOptions, connector: Arc<dyn Connector>) -> Self {
        Self {
            options,
            connector,
            state: StateCell::new(),
            transport: RwLock::new(None),
            epochs: AtomicU64::new(0),
            connect_lock: AsyncMutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Returns the transport if the bridge is ready.
    pub(crate) fn ready_transport(&self) -> Option<Arc<dyn Transport>> {
        let transport = self.transport.read();
        if self.state.get().is_ready() {
            transport.as_ref().map(|installed| Arc::clone(&installed.transport))
        } else {
            None
        }
    }

    /// Connects to `address`, retrying within the budget.
    ///
    /// Returns immediately if already ready. Every opened transport gets the
    /// handler `handlers` builds for its epoch.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `address` is not a `ws`/`wss` URL
    /// - [`Error::Cancelled`] if `cancel` fires
    /// - [`Error::Disposed`] if the client is disposed meanwhile
    /// - [`Error::ConnectFailed`] with the last failure once the budget is spent
    pub(crate) async fn connect(
        &self,
        address: &str,
        cancel: &CancellationToken,
        correlator: &Correlator,
        handlers: &HandlerFactory,
    ) -> Result<()> {
        let url = parse_address(address)?;

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.connect_lock.lock() => guard,
        };

        match self.state.get() {
            ConnectionState::Ready => return Ok(()),
            ConnectionState::Disposed => return Err(Error::Disposed),
            _ => {}
        }

        let attempts = self.options.connect_retries.max(1);
        let timeout_ms = self.options.connect_timeout_ms();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, attempts, "Connect attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = timeout(
                    self.options.connect_timeout,
                    self.attempt(&url, correlator, handlers),
                ) => result.unwrap_or_else(|_| Err(Error::connection_timeout(timeout_ms))),
            };

            match outcome {
                Ok(()) => {
                    info!(url = %url, attempt, "Bridge ready");
                    return Ok(());
                }
                Err(Error::Disposed) => return Err(Error::Disposed),
                Err(Error::Cancelled) => {
                    debug!(url = %url, attempt, "Connect cancelled");
                    self.abandon();
                    return Err(Error::Cancelled);
                }
                Err(e) if attempt >= attempts => {
                    warn!(url = %url, attempt, error = %e, "Connect failed, retries exhausted");
                    self.abandon();
                    return Err(Error::connect_failed(attempt, e));
                }
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "Connect attempt failed, retrying");
                }
            }
        }
    }

    /// One attempt: open if needed, then handshake.
    async fn attempt(
        &self,
        url: &Url,
        correlator: &Correlator,
        handlers: &HandlerFactory,
    ) -> Result<()> {
        let existing = self
            .transport
            .read()
            .as_ref()
            .map(|installed| (installed.epoch, Arc::clone(&installed.transport)));

        let (epoch, transport) = match existing {
            Some(current) => current,
            None => {
                self.state.advance(ConnectionState::Connecting)?;
                let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
                let transport = self.connector.open(url, handlers(epoch)).await?;
                self.install(epoch, Arc::clone(&transport))?;
                (epoch, transport)
            }
        };

        self.state.advance(ConnectionState::Handshaking)?;

        let pending = correlator.register();
        if pending.is_closed() {
            return Err(Error::Disposed);
        }

        let text = Request::new(pending.id(), Method::PrepareJsRuntime).encode()?;
        if let Err(e) = transport.send(text).await {
            // Dead before the close was reported; reopen on the next attempt.
            transport.close();
            self.transport_closed(epoch);
            return Err(e);
        }

        let prepared = pending.wait().await?;
        debug!(result = %prepared, "Runtime prepared");

        self.state.advance(ConnectionState::Ready)
    }

    /// Stores a freshly opened transport unless disposed meanwhile.
    fn install(&self, epoch: u64, transport: Arc<dyn Transport>) -> Result<()> {
        let mut slot = self.transport.write();
        if self.state.get().is_disposed() {
            drop(slot);
            transport.close();
            return Err(Error::Disposed);
        }
        *slot = Some(Installed { epoch, transport });
        Ok(())
    }

    /// Closes the transport after a failed connect.
    fn abandon(&self) {
        let installed = self.transport.write().take();
        if let Some(installed) = installed {
            installed.transport.close();
        }
        let _ = self.state.advance(ConnectionState::Disconnected);
    }

    /// Reacts to the transport opened as `epoch` going away.
    ///
    /// Returns `false`, changing nothing, if that transport is no longer the
    /// current one.
    pub(crate) fn transport_closed(&self, epoch: u64) -> bool {
        {
            let mut slot = self.transport.write();
            if slot.as_ref().is_none_or(|installed| installed.epoch != epoch) {
                debug!(epoch, "Ignoring close of a replaced transport");
                return false;
            }
            *slot = None;
        }

        if self.state.advance(ConnectionState::Disconnected).is_ok() {
            info!(epoch, "Transport closed, bridge disconnected");
        }
        true
    }

    /// Marks the manager disposed and closes the transport.
    ///
    /// Returns `false` if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if !self.state.dispose() {
            return false;
        }

        let installed = self.transport.write().take();
        if let Some(installed) = installed {
            installed.transport.close();
        }
        true
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Validates a remote host address.
pub(crate) fn parse_address(address: &str) -> Result<Url> {
    let url = Url::parse(address).map_err(|e| Error::invalid_address(address, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(Error::invalid_address(
            address,
            format!("unsupported scheme '{scheme}', expected ws or wss"),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
