//! Inbound message parsing.
//!
//! The script host only ever talks back with replies. Anything else that
//! arrives on the channel is classified as [`Inbound::Other`] and ignored
//! by the bridge.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

/// Field that marks a document as a reply.
const REPLY_ID_FIELD: &str = "replyID";

// ============================================================================
// Inbound
// ============================================================================

/// A parsed inbound document.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Reply to a previously sent request.
    Reply(Reply),
    /// Well-formed JSON that is not a reply.
    Other(Value),
}

impl Inbound {
    /// Parses inbound wire text.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if `replyID` is not an unsigned integer
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        match value.get(REPLY_ID_FIELD) {
            None => Ok(Self::Other(value)),
            Some(id) if !id.is_u64() => Err(Error::protocol(format!(
                "{REPLY_ID_FIELD} must be an unsigned integer, got {id}"
            ))),
            Some(_) => Ok(Self::Reply(serde_json::from_value(value)?)),
        }
    }
}

// ============================================================================
// Reply
// ============================================================================

/// A reply from the script host.
///
/// # Format
///
/// ```json
/// { "replyID": 7, "result": "[[1],[2],[[]],0]" }
/// ```
///
/// `result` may be absent, and a host reporting failure sends `error`
/// instead.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    /// Identifier of the request this answers.
    #[serde(rename = "replyID")]
    pub id: RequestId,

    /// Result value, possibly JSON text that needs one more decode.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error reported by the host.
    #[serde(default)]
    pub error: Option<Value>,
}

impl Reply {
    /// Converts the reply into the value delivered to the caller.
    ///
    /// - `error` present: [`Error::Script`]
    /// - `result` absent: `Value::Null`
    /// - `result` a string: decoded once more as JSON; text that is not JSON
    ///   is delivered unchanged
    /// - otherwise the result as is
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error.filter(|e| !e.is_null()) {
            let message = match error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Err(Error::script(message));
        }

        match self.result {
            None => Ok(Value::Null),
            Some(Value::String(text)) => match serde_json::from_str(&text) {
                Ok(inner) => Ok(inner),
                Err(e) => {
                    debug!(id = %self.id, error = %e, "String result is not JSON, delivering as-is");
                    Ok(Value::String(text))
                }
            },
            Some(value) => Ok(value),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
