//! Bridge wire protocol.
//!
//! This module defines the JSON documents exchanged between the native side
//! and the remote script host.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Method call with correlation `id` |
//! | `Reply` | Remote → Local | Result keyed by `replyID` |
//!
//! # Methods
//!
//! - `prepareJSRuntime`
//! - `executeApplicationScript`
//! - `callFunctionReturnFlushedQueue`
//! - `invokeCallbackAndReturnFlushedQueue`
//! - `flushedQueue`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `globals` | Injected globals map |
//! | `reply` | Inbound parsing |
//! | `request` | Outbound envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Injected globals map.
pub mod globals;

/// Inbound reply parsing.
pub mod reply;

/// Outbound request envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use globals::InjectedGlobals;
pub use reply::{Inbound, Reply};
pub use request::{Method, Request};
