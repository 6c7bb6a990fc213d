//! Herald Core - event dispatch and campaign delivery
//!
//! This crate provides the engine behind Herald's triggered campaigns:
//! event registration and matching, per-field content rendering,
//! recipient resolution, mailer backends, and the dispatch orchestrator
//! that ties them together.

pub mod conditions;
pub mod content;
pub mod dispatch;
pub mod events;
pub mod mailers;
pub mod recipients;

pub use conditions::ConditionEvaluator;
pub use content::{render_content, ContentField, PlaceholderRenderer, RenderContext, RenderedContent, TemplateRenderer};
pub use dispatch::{BindingTable, DispatchOrchestrator, DispatchSummary, PostSendEvent, PostSendHook};
pub use events::{EventDescriptor, EventRegistry};
pub use mailers::{CopyPasteMailer, DefaultMailer, ExportedEmail, Mailer, MailerRegistry, OutboundCampaign, RecipientList, RecipientOutcome, SendReport, SettingField, BUILTIN_MAILERS};
pub use recipients::{is_placeholder, resolve_recipients, validate_address, ResolvedRecipients};
