//! Event descriptor contract

use herald_common::types::{Entity, EventParams, OptionsBlob};
use herald_common::Result;

/// One triggerable lifecycle event kind.
///
/// A descriptor owns the semantics of its options: how raw submitted
/// configuration becomes a stored [`OptionsBlob`], and whether a stored
/// blob matches a concrete occurrence. Descriptors are registered once
/// at startup and shared immutably afterwards.
pub trait EventDescriptor: Send + Sync {
    /// Globally unique qualified key, e.g. `entries.save`.
    fn key(&self) -> &str;

    /// Short human-readable name shown when choosing an event.
    fn title(&self) -> &str;

    /// Longer description shown when configuring a binding.
    fn description(&self) -> &str;

    /// Convert raw submitted configuration into the versioned blob
    /// stored on a binding.
    ///
    /// Deterministic and free of I/O. Unknown fields are ignored and
    /// missing fields take their defaults, so older submissions keep
    /// parsing after an options struct grows.
    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob>;

    /// Decide whether a binding configured with `options` applies to
    /// this occurrence.
    ///
    /// Pure. `Ok(false)` is the expected non-match outcome, not a
    /// failure; an `Err` marks a descriptor bug or a corrupt blob and
    /// is treated as non-match by the evaluator.
    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        params: &EventParams,
    ) -> Result<bool>;
}
