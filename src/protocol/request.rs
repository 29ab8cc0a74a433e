//! Outbound request envelopes.
//!
//! Every request carries the correlation `id` and a `method`; the remaining
//! fields depend on the method and sit at the top level of the document.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::RequestId;

use super::InjectedGlobals;

// ============================================================================
// Request
// ============================================================================

/// A request from the native side to the script host.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "callFunctionReturnFlushedQueue",
///   "arguments": ["AppRegistry", "runApplication", [...]]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Identifier of the pending call expecting the reply.
    pub id: RequestId,

    /// Method name and its payload.
    #[serde(flatten)]
    pub method: Method,
}

impl Request {
    /// Creates a request for an already registered identifier.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, method: Method) -> Self {
        Self { id, method }
    }

    /// Serializes the request into wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if a payload value fails
    /// to serialize.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Method
// ============================================================================

/// Methods understood by the remote script host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method")]
pub enum Method {
    /// Runtime preparation handshake.
    #[serde(rename = "prepareJSRuntime")]
    PrepareJsRuntime,

    /// Load and run the application bundle.
    #[serde(rename = "executeApplicationScript")]
    ExecuteApplicationScript {
        /// Bundle URL.
        url: String,
        /// Globals seeded into the script environment.
        inject: InjectedGlobals,
    },

    /// Call `module.method(...args)` and return the flushed queue.
    #[serde(rename = "callFunctionReturnFlushedQueue")]
    CallFunctionReturnFlushedQueue {
        /// `[moduleName, methodName, argArray]`.
        arguments: (String, String, Value),
    },

    /// Invoke a native-to-script callback and return the flushed queue.
    #[serde(rename = "invokeCallbackAndReturnFlushedQueue")]
    InvokeCallbackAndReturnFlushedQueue {
        /// `[callbackId, argArray]`.
        arguments: (u64, Value),
    },

    /// Return the queued native calls.
    #[serde(rename = "flushedQueue")]
    FlushedQueue {
        /// Always `[]`.
        arguments: [Value; 0],
    },
}

impl Method {
    /// Builds an `executeApplicationScript` method.
    #[must_use]
    pub fn execute_application_script(url: impl Into<String>, inject: InjectedGlobals) -> Self {
        Self::ExecuteApplicationScript {
            url: url.into(),
            inject,
        }
    }

    /// Builds a `callFunctionReturnFlushedQueue` method.
    #[must_use]
    pub fn call_function(module: impl Into<String>, method: impl Into<String>, args: Value) -> Self {
        Self::CallFunctionReturnFlushedQueue {
            arguments: (module.into(), method.into(), args),
        }
    }

    /// Builds an `invokeCallbackAndReturnFlushedQueue` method.
    #[must_use]
    pub fn invoke_callback(callback_id: u64, args: Value) -> Self {
        Self::InvokeCallbackAndReturnFlushedQueue {
            arguments: (callback_id, args),
        }
    }

    /// Builds a `flushedQueue` method.
    #[must_use]
    pub fn flushed_queue() -> Self {
        Self::FlushedQueue { arguments: [] }
    }

    /// Returns the wire method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrepareJsRuntime => "prepareJSRuntime",
            Self::ExecuteApplicationScript { .. } => "executeApplicationScript",
            Self::CallFunctionReturnFlushedQueue { .. } => "callFunctionReturnFlushedQueue",
            Self::InvokeCallbackAndReturnFlushedQueue { .. } => {
                "invokeCallbackAndReturnFlushedQueue"
            }
            Self::FlushedQueue { .. } => "flushedQueue",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
