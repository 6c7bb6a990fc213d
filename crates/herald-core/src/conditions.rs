//! Condition evaluation
//!
//! Narrows the enabled bindings for a fired event down to the subset
//! whose options match the occurrence. The evaluator holds no
//! entity-specific logic; matching semantics live entirely in the
//! event descriptor.

use herald_common::types::{Entity, EventParams};
use herald_storage::models::Binding;
use tracing::{debug, warn};

use crate::events::EventDescriptor;

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Return the bindings whose options match the fired occurrence,
    /// preserving their order.
    ///
    /// A validator error counts as a non-match: the failing binding is
    /// logged and dropped while its siblings still evaluate.
    pub fn matching(
        descriptor: &dyn EventDescriptor,
        bindings: &[Binding],
        entity: &Entity,
        params: &EventParams,
    ) -> Vec<Binding> {
        let mut matched = Vec::new();

        for binding in bindings {
            match descriptor.validate(&binding.options, entity, params) {
                Ok(true) => matched.push(binding.clone()),
                Ok(false) => {
                    debug!(
                        binding_id = %binding.id,
                        event_key = %binding.event_key,
                        "Binding conditions did not match"
                    );
                }
                Err(e) => {
                    warn!(
                        binding_id = %binding.id,
                        event_key = %binding.event_key,
                        error = %e,
                        "Binding evaluation failed, treating as non-match"
                    );
                }
            }
        }

        matched
    }
}
