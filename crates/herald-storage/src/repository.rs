//! PostgreSQL repository implementations

pub mod bindings;
pub mod campaigns;
pub mod delivery_log;
pub mod instances;
pub mod mailer_settings;

pub use bindings::PgBindingStore;
pub use campaigns::PgCampaignStore;
pub use delivery_log::PgDeliveryLog;
pub use instances::PgInstanceStore;
pub use mailer_settings::PgMailerSettingsStore;
