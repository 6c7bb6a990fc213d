//! Recipient resolution
//!
//! Turns a definition's recipient spec into the concrete address list
//! for one send. Placeholder entries render against the fired entity
//! before validation, malformed addresses are rejected with a reason,
//! duplicates within the batch collapse to one delivery, and members
//! of the mailer's named lists are merged in.

use std::collections::HashSet;

use herald_common::types::RecipientsSpec;
use regex::Regex;
use tracing::debug;

use crate::content::{RenderContext, TemplateRenderer};
use crate::mailers::RecipientList;

/// Placeholder entries defer address validation until rendering has
/// resolved them.
pub fn is_placeholder(address: &str) -> bool {
    address.trim_start().starts_with('{')
}

/// Light shape check; full validation belongs to the transport.
pub fn validate_address(address: &str) -> bool {
    let shape = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    shape.is_match(address)
}

/// Outcome of resolving a recipients spec.
#[derive(Debug, Default)]
pub struct ResolvedRecipients {
    /// Addresses accepted for delivery, in first-seen order.
    pub valid: Vec<String>,
    /// Rejected entries paired with the rejection reason.
    pub invalid: Vec<(String, String)>,
}

impl ResolvedRecipients {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Resolve the spec for one send.
///
/// `lists` are the named lists the campaign's mailer exposes; only the
/// ones the spec references contribute members.
pub async fn resolve_recipients(
    spec: &RecipientsSpec,
    renderer: &dyn TemplateRenderer,
    context: &RenderContext<'_>,
    lists: &[RecipientList],
) -> ResolvedRecipients {
    let mut resolved = ResolvedRecipients::default();
    let mut seen = HashSet::new();

    for entry in &spec.addresses {
        let address = if is_placeholder(entry) {
            match renderer.render(entry, context).await {
                Ok(rendered) => rendered.trim().to_string(),
                Err(e) => {
                    resolved
                        .invalid
                        .push((entry.clone(), format!("Placeholder failed to render: {}", e)));
                    continue;
                }
            }
        } else {
            entry.trim().to_string()
        };

        if !validate_address(&address) {
            resolved
                .invalid
                .push((entry.clone(), format!("Malformed address: {}", address)));
            continue;
        }

        if seen.insert(address.clone()) {
            resolved.valid.push(address);
        } else {
            debug!(address = %address, "Duplicate recipient within batch, collapsing");
        }
    }

    for list in lists {
        if !spec.lists.iter().any(|name| name == &list.handle) {
            continue;
        }
        for member in &list.members {
            if !validate_address(member) {
                resolved
                    .invalid
                    .push((member.clone(), format!("Malformed address in list {}", list.handle)));
                continue;
            }
            if seen.insert(member.clone()) {
                resolved.valid.push(member.clone());
            }
        }
    }

    resolved
}
