//! Dispatch pipeline
//!
//! The binding table caches enabled bindings by event key, the
//! orchestrator runs fired events through matching, rendering, and
//! delivery, and post-send hooks let hosts observe completed sends.

pub mod hooks;
pub mod orchestrator;
pub mod table;

pub use hooks::{PostSendEvent, PostSendHook};
pub use orchestrator::{DispatchOrchestrator, DispatchSummary};
pub use table::BindingTable;
