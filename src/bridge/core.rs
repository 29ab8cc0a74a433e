//! Bridge client implementation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Inbound, InjectedGlobals, Method, Request};
use crate::transport::{Connector, InboundHandler};

use super::builder::BridgeClientBuilder;
use super::correlator::Correlator;
use super::manager::ConnectionManager;
use super::options::BridgeOptions;
use super::state::ConnectionState;

// ============================================================================
// Inner
// ============================================================================

/// State shared between the client and its inbound router.
struct Inner {
    connection: ConnectionManager,
    correlator: Correlator,
    globals: Mutex<InjectedGlobals>,
}

impl Inner {
    /// Routes one inbound message. Never blocks on I/O.
    fn handle_message(&self, text: &str) {
        match Inbound::decode(text) {
            Ok(Inbound::Reply(reply)) => {
                self.correlator.resolve_reply(reply);
            }
            Ok(Inbound::Other(value)) => {
                debug!(message = %value, "Ignoring non-reply message");
            }
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to decode inbound message");
            }
        }
    }

    /// Handles the close of the transport opened as `epoch`.
    ///
    /// A close reported by a transport that was already replaced is ignored.
    fn handle_closed(&self, epoch: u64) {
        if self.connection.transport_closed(epoch) {
            self.correlator.fail_all(|| Error::ConnectionClosed);
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Inbound handler registered with one transport.
///
/// Holds a weak reference so an open transport does not keep a dropped
/// client alive. `epoch` identifies the transport it was opened for.
struct Router {
    inner: Weak<Inner>,
    epoch: u64,
}

impl InboundHandler for Router {
    fn on_message(&self, text: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(text);
        }
    }

    fn on_closed(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_closed(self.epoch);
        }
    }
}

// ============================================================================
// BridgeClient
// ============================================================================

/// Client side of the JavaScript execution bridge.
///
/// Share it between tasks behind an [`Arc`]; every method takes `&self`.
/// Dropping the client disposes it.
///
/// # Example
///
/// ```no_run
/// use js_bridge::{BridgeClient, Result};
/// use serde_json::json;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<()> {
/// let client = BridgeClient::new();
/// client
///     .connect("ws://localhost:8081/debugger-proxy?role=client", &CancellationToken::new())
///     .await?;
///
/// client.set_global_variable("__DEV__", &json!(true));
/// client.run_script("http://localhost:8081/index.bundle").await?;
///
/// let queue = client
///     .call_function("AppRegistry", "runApplication", json!(["App", {"rootTag": 1}]))
///     .await?;
/// println!("{queue}");
///
/// client.dispose();
/// # Ok(())
/// # }
/// ```
///
/// Requests only go out through the typed calls above. Raw wire methods,
/// including a second `prepareJSRuntime`, cannot be sent:
///
/// ```compile_fail
/// # async fn raw(client: &js_bridge::BridgeClient) {
/// let _ = client.call(js_bridge::Method::PrepareJsRuntime).await;
/// # }
/// ```
pub struct BridgeClient {
    inner: Arc<Inner>,
}

// ============================================================================
// BridgeClient - Constructors
// ============================================================================

impl BridgeClient {
    /// Creates a client using WebSocket transport and default options.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeClientBuilder {
        BridgeClientBuilder::new()
    }

    pub(crate) fn from_parts(options: BridgeOptions, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection: ConnectionManager::new(options, connector),
                correlator: Correlator::new(),
                globals: Mutex::new(InjectedGlobals::new()),
            }),
        }
    }
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BridgeClient - Connection
// ============================================================================

impl BridgeClient {
    /// Connects to the script host and performs the handshake.
    ///
    /// Returns immediately if already connected.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `address` is not a `ws`/`wss` URL
    /// - [`Error::Cancelled`] if `cancel` fires first
    /// - [`Error::ConnectFailed`] once the retry budget is spent
    /// - [`Error::Disposed`] if the client is disposed
    pub async fn connect(&self, address: &str, cancel: &CancellationToken) -> Result<()> {
        let inner = Arc::downgrade(&self.inner);
        let router = move |epoch: u64| -> Arc<dyn InboundHandler> {
            Arc::new(Router {
                inner: Weak::clone(&inner),
                epoch,
            })
        };

        self.inner
            .connection
            .connect(address, cancel, &self.inner.correlator, &router)
            .await
    }

    /// Disposes the client. Idempotent and never fails.
    ///
    /// Closes the transport and resolves every pending call with
    /// `Value::Null`. Calls issued afterwards resolve to `Value::Null`
    /// without I/O.
    pub fn dispose(&self) {
        if !self.inner.connection.dispose() {
            return;
        }

        let resolved = self.inner.correlator.close();
        info!(resolved, "Bridge client disposed");
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Returns the number of calls waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.pending_count()
    }
}

// ============================================================================
// BridgeClient - Calls
// ============================================================================

impl BridgeClient {
    /// Loads and runs the application bundle at `script_url`.
    ///
    /// Sends every global set so far in `inject`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before `connect` succeeded
    /// - [`Error::Script`] if the host replied with an error
    /// - [`Error::ConnectionClosed`] if the transport went away mid-call
    pub async fn run_script(&self, script_url: &str) -> Result<()> {
        let inject = self.inner.globals.lock().clone();
        debug!(url = script_url, globals = inject.len(), "Running script");

        self.call(Method::execute_application_script(script_url, inject))
            .await
            .map(|_| ())
    }

    /// Calls `module.method(...args)` and returns the flushed queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before `connect` succeeded
    /// - [`Error::Script`] if the host replied with an error
    /// - [`Error::ConnectionClosed`] if the transport went away mid-call
    pub async fn call_function(&self, module: &str, method: &str, args: Value) -> Result<Value> {
        self.call(Method::call_function(module, method, args)).await
    }

    /// Invokes callback `callback_id` and returns the flushed queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before `connect` succeeded
    /// - [`Error::Script`] if the host replied with an error
    /// - [`Error::ConnectionClosed`] if the transport went away mid-call
    pub async fn invoke_callback(&self, callback_id: u64, args: Value) -> Result<Value> {
        self.call(Method::invoke_callback(callback_id, args)).await
    }

    /// Returns the queue of pending native calls.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before `connect` succeeded
    /// - [`Error::Script`] if the host replied with an error
    /// - [`Error::ConnectionClosed`] if the transport went away mid-call
    pub async fn flushed_queue(&self) -> Result<Value> {
        self.call(Method::flushed_queue()).await
    }

    /// Sets a global injected into every later script run.
    ///
    /// `value` is stored as its JSON text. No I/O.
    pub fn set_global_variable(&self, name: &str, value: &Value) {
        self.inner.globals.lock().set(name, value);
        trace!(name, "Global variable set");
    }

    /// Sends `method` and waits for its reply.
    ///
    /// After disposal, resolves to `Value::Null` without sending.
    async fn call(&self, method: Method) -> Result<Value> {
        let pending = self.inner.correlator.register();

        if pending.is_closed() {
            trace!(id = %pending.id(), method = method.name(), "Call after dispose");
            return pending.wait().await;
        }

        let Some(transport) = self.inner.connection.ready_transport() else {
            let state = self.state();
            if state.is_disposed() {
                return pending.wait().await;
            }
            return Err(Error::not_connected(state));
        };

        let id = pending.id();
        let name = method.name();
        let text = Request::new(id, method).encode()?;

        debug!(%id, method = name, "Sending call");

        if let Err(e) = transport.send(text).await {
            if self.state().is_disposed() {
                return pending.wait().await;
            }
            warn!(%id, method = name, error = %e, "Send failed");
            return Err(e);
        }

        let result = pending.wait().await;
        trace!(%id, method = name, ok = result.is_ok(), "Call completed");
        result
    }
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use proptest::prelude::*;
    use serde_json::json;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::transport::{MemoryConnector, RemoteEnd};

    const ADDRESS: &str = "ws://localhost:8081/debugger-proxy?role=client";

    /// Client plus a remote end that already answered the handshake.
    async fn connected() -> (Arc<BridgeClient>, RemoteEnd) {
        let (connector, mut remote) = MemoryConnector::new();
        let client = Arc::new(BridgeClient::builder().connector(connector).build());

        let connecting = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.connect(ADDRESS, &CancellationToken::new()).await })
        };

        let handshake = remote.recv_request().await.expect("handshake");
        assert_eq!(handshake["method"], "prepareJSRuntime");
        remote.reply(handshake["id"].as_u64().expect("id"), Value::Null);

        connecting.await.expect("task").expect("connect");
        assert_eq!(client.state(), ConnectionState::Ready);

        (client, remote)
    }

    fn id_of(request: &Value) -> u64 {
        request["id"].as_u64().expect("id")
    }

    #[tokio::test]
    async fn test_call_function_returns_decoded_queue() {
        let (client, mut remote) = connected().await;

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .call_function("AppRegistry", "runApplication", json!(["App"]))
                    .await
            })
        };

        let request = remote.recv_request().await.expect("request");
        assert_eq!(request["method"], "callFunctionReturnFlushedQueue");
        assert_eq!(request["arguments"], json!(["AppRegistry", "runApplication", ["App"]]));
        remote.reply(id_of(&request), json!("[[1],[2],[[]],7]"));

        let queue = call.await.expect("task").expect("call");
        assert_eq!(queue, json!([[1], [2], [[]], 7]));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_callback_and_flushed_queue() {
        let (client, mut remote) = connected().await;

        let invoke = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.invoke_callback(4, json!(["done"])).await })
        };
        let request = remote.recv_request().await.expect("request");
        assert_eq!(request["method"], "invokeCallbackAndReturnFlushedQueue");
        assert_eq!(request["arguments"], json!([4, ["done"]]));
        remote.reply(id_of(&request), json!({"queued": 0}));
        assert_eq!(invoke.await.expect("task").expect("ok"), json!({"queued": 0}));

        let flush = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.flushed_queue().await })
        };
        let request = remote.recv_request().await.expect("request");
        assert_eq!(request["method"], "flushedQueue");
        assert_eq!(request["arguments"], json!([]));
        remote.push(format!(r#"{{"replyID": {}}}"#, id_of(&request)));
        assert_eq!(flush.await.expect("task").expect("ok"), Value::Null);
    }

    #[tokio::test]
    async fn test_call_waits_for_its_reply() {
        let (client, mut remote) = connected().await;

        let mut flush = task::spawn(client.flushed_queue());
        assert_pending!(flush.poll());

        let request = remote.recv_request().await.expect("request");
        assert_pending!(flush.poll());

        remote.reply(id_of(&request), json!("[]"));
        assert!(flush.is_woken());
        let result = assert_ready!(flush.poll());
        assert_eq!(result.expect("ok"), json!([]));
    }

    #[tokio::test]
    async fn test_globals_sent_with_every_script_run() {
        let (client, mut remote) = connected().await;
        client.set_global_variable("x", &json!(1));

        for _ in 0..2 {
            let run = {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.run_script("http://localhost:8081/index.bundle").await })
            };

            let request = remote.recv_request().await.expect("request");
            assert_eq!(request["method"], "executeApplicationScript");
            assert_eq!(request["url"], "http://localhost:8081/index.bundle");
            assert_eq!(request["inject"], json!({"x": "1"}));

            remote.reply(id_of(&request), Value::Null);
            run.await.expect("task").expect("run");
        }
    }

    #[tokio::test]
    async fn test_script_error_is_returned_unwrapped() {
        let (client, mut remote) = connected().await;

        let run = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.run_script("http://localhost:8081/broken.bundle").await })
        };

        let request = remote.recv_request().await.expect("request");
        remote.reply_error(id_of(&request), "SyntaxError: Unexpected token");

        let err = run.await.expect("task").unwrap_err();
        assert!(matches!(err, Error::Script { ref message } if message == "SyntaxError: Unexpected token"));
    }

    #[tokio::test]
    async fn test_malformed_message_is_ignored() {
        let (client, mut remote) = connected().await;

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.flushed_queue().await })
        };
        let request = remote.recv_request().await.expect("request");

        assert!(remote.push("{this is not json"));
        assert!(remote.push(r#"{"method": "$disconnected"}"#));
        assert!(remote.push(format!(r#"{{"replyID": "{}"}}"#, id_of(&request))));
        assert!(remote.reply(id_of(&request) + 100, json!("1")));
        tokio::task::yield_now().await;
        assert!(!call.is_finished());
        assert_eq!(client.pending_count(), 1);

        remote.reply(id_of(&request), json!("[0]"));
        assert_eq!(call.await.expect("task").expect("ok"), json!([0]));
    }

    #[tokio::test]
    async fn test_call_before_connect_is_rejected() {
        let (connector, _remote) = MemoryConnector::new();
        let client = BridgeClient::builder().connector(connector).build();

        let err = client.flushed_queue().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_resolves_pending_and_later_calls() {
        let (client, mut remote) = connected().await;

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.call_function("M", "f", json!([])).await })
        };
        let _request = remote.recv_request().await.expect("request");

        client.dispose();
        client.dispose();

        let resolved = timeout(Duration::from_secs(1), pending)
            .await
            .expect("resolved in time")
            .expect("task")
            .expect("null result");
        assert_eq!(resolved, Value::Null);

        let after = timeout(Duration::from_secs(1), client.flushed_queue())
            .await
            .expect("resolved in time")
            .expect("null result");
        assert_eq!(after, Value::Null);

        assert_eq!(client.state(), ConnectionState::Disposed);
        assert!(!remote.is_open());
        assert!(remote.try_recv().is_none(), "nothing sent after dispose");
        assert!(matches!(
            client.connect(ADDRESS, &CancellationToken::new()).await,
            Err(Error::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_remote_disconnect_fails_in_flight_calls() {
        let (client, mut remote) = connected().await;

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.flushed_queue().await })
        };
        let _request = remote.recv_request().await.expect("request");

        remote.disconnect();

        let err = call.await.expect("task").unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(
            client.flushed_queue().await,
            Err(Error::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconnect_after_remote_disconnect() {
        let (client, mut remote) = connected().await;
        remote.disconnect();

        let reconnecting = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.connect(ADDRESS, &CancellationToken::new()).await })
        };
        let handshake = remote.recv_request().await.expect("handshake");
        remote.reply(id_of(&handshake), Value::Null);

        reconnecting.await.expect("task").expect("reconnect");
        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(remote.open_count(), 2);
    }

    #[tokio::test]
    async fn test_drop_closes_transport() {
        let (connector, mut remote) = MemoryConnector::new();
        let client = BridgeClient::builder().connector(connector).build();
        let cancel = CancellationToken::new();

        let (connected, ()) = tokio::join!(client.connect(ADDRESS, &cancel), async {
            let handshake = remote.recv_request().await.expect("handshake");
            remote.reply(id_of(&handshake), Value::Null);
        });
        connected.expect("connect");
        assert!(remote.is_open());

        drop(client);
        assert!(!remote.is_open());
    }

    /// Issues `count` concurrent calls and answers them in `order`.
    async fn answer_out_of_order(order: Vec<usize>) {
        let (client, mut remote) = connected().await;
        let count = order.len();

        let calls: Vec<_> = (0..count)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .call_function("Echo", "echo", json!([i]))
                        .await
                        .map(|value| (i, value))
                })
            })
            .collect();

        let mut requests = Vec::with_capacity(count);
        for _ in 0..count {
            requests.push(remote.recv_request().await.expect("request"));
        }

        for index in order {
            let request = &requests[index];
            let arg = request["arguments"][2][0].clone();
            remote.reply(id_of(request), Value::String(json!({"echo": arg}).to_string()));
        }

        for call in calls {
            let (i, value) = call.await.expect("task").expect("call");
            assert_eq!(value, json!({"echo": i}));
        }
        assert_eq!(client.pending_count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_replies_match_by_id(order in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(answer_out_of_order(order));
        }
    }
}
