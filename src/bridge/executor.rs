//! Capability interface consumed by the rest of the application.
//!
//! Module managers and the UI side depend on [`JavaScriptExecutor`] rather
//! than on [`BridgeClient`], so they can be driven by any executor.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

use super::core::BridgeClient;

// ============================================================================
// JavaScriptExecutor
// ============================================================================

/// Operations a JavaScript executor offers to native code.
#[async_trait]
pub trait JavaScriptExecutor: Send + Sync {
    /// Connects to the script host.
    async fn connect(&self, address: &str, cancel: &CancellationToken) -> Result<()>;

    /// Runs the application bundle at `script_url`.
    async fn run_script(&self, script_url: &str) -> Result<()>;

    /// Calls a script module function and returns the flushed queue.
    async fn call_function(&self, module: &str, method: &str, args: Value) -> Result<Value>;

    /// Invokes a script callback and returns the flushed queue.
    async fn invoke_callback(&self, callback_id: u64, args: Value) -> Result<Value>;

    /// Returns the flushed queue.
    async fn flushed_queue(&self) -> Result<Value>;

    /// Sets a global injected into later script runs.
    fn set_global_variable(&self, name: &str, value: &Value);

    /// Tears the executor down.
    fn dispose(&self);
}

#[async_trait]
impl JavaScriptExecutor for BridgeClient {
    async fn connect(&self, address: &str, cancel: &CancellationToken) -> Result<()> {
        BridgeClient::connect(self, address, cancel).await
    }

    async fn run_script(&self, script_url: &str) -> Result<()> {
        BridgeClient::run_script(self, script_url).await
    }

    async fn call_function(&self, module: &str, method: &str, args: Value) -> Result<Value> {
        BridgeClient::call_function(self, module, method, args).await
    }

    async fn invoke_callback(&self, callback_id: u64, args: Value) -> Result<Value> {
        BridgeClient::invoke_callback(self, callback_id, args).await
    }

    async fn flushed_queue(&self) -> Result<Value> {
        BridgeClient::flushed_queue(self).await
    }

    fn set_global_variable(&self, name: &str, value: &Value) {
        BridgeClient::set_global_variable(self, name, value);
    }

    fn dispose(&self) {
        BridgeClient::dispose(self);
    }
}

// ============================================================================
// Tests
// ============================================================================
