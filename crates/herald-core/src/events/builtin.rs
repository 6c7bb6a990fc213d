//! Built-in event library
//!
//! Descriptors for the host lifecycle events Herald ships with. Hosts
//! contribute further descriptors through `EventRegistry::register`.

use std::sync::Arc;

use herald_common::types::{Entity, EventParams, OptionsBlob};
use herald_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::descriptor::EventDescriptor;

/// Every built-in descriptor, in registration order.
pub fn all() -> Vec<Arc<dyn EventDescriptor>> {
    vec![
        Arc::new(EntrySaveEvent),
        Arc::new(EntryDeleteEvent),
        Arc::new(UserSaveEvent),
        Arc::new(UserActivateEvent),
        Arc::new(UserDeleteEvent),
        Arc::new(UserLoginEvent),
    ]
}

fn parse_options<T>(event_key: &str, raw: &serde_json::Value) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if raw.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| Error::Validation(format!("Invalid options for {}: {}", event_key, e)))
}

/// An empty selection matches every id.
fn scalar_selected(selected: &[i64], actual: Option<i64>) -> bool {
    if selected.is_empty() {
        return true;
    }
    actual.map(|id| selected.contains(&id)).unwrap_or(false)
}

/// An empty selection matches everything; otherwise at least one of
/// the entity's ids must be selected.
fn any_selected(selected: &[i64], actual: &[i64]) -> bool {
    if selected.is_empty() {
        return true;
    }
    actual.iter().any(|id| selected.contains(id))
}

/// Neither flag restricts; each flag alone pins the save kind.
fn save_kind_matches(when_new: bool, when_updated: bool, is_new: bool) -> bool {
    if when_new == when_updated {
        return true;
    }
    (when_new && is_new) || (when_updated && !is_new)
}

/// Options for [`EntrySaveEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySaveOptions {
    /// Section ids to match. Empty matches every section.
    #[serde(default)]
    pub section_ids: Vec<i64>,
    /// Category ids to match. Empty matches every category.
    #[serde(default)]
    pub category_ids: Vec<i64>,
    /// Match only when the save created the entry.
    #[serde(default)]
    pub when_new: bool,
    /// Match only when the save updated an existing entry.
    #[serde(default)]
    pub when_updated: bool,
}

/// `entries.save` — an entry was created or updated.
pub struct EntrySaveEvent;

impl EventDescriptor for EntrySaveEvent {
    fn key(&self) -> &str {
        "entries.save"
    }

    fn title(&self) -> &str {
        "When an entry is saved"
    }

    fn description(&self) -> &str {
        "Triggered when an entry is created or updated."
    }

    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob> {
        let options: EntrySaveOptions = parse_options(self.key(), raw)?;
        OptionsBlob::encode(&options)
    }

    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        params: &EventParams,
    ) -> Result<bool> {
        let options: EntrySaveOptions = options.decode()?;
        if !save_kind_matches(options.when_new, options.when_updated, params.is_new) {
            return Ok(false);
        }
        Ok(scalar_selected(&options.section_ids, entity.attr_i64("section_id"))
            && scalar_selected(&options.category_ids, entity.attr_i64("category_id")))
    }
}

/// Options for [`EntryDeleteEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDeleteOptions {
    /// Section ids to match. Empty matches every section.
    #[serde(default)]
    pub section_ids: Vec<i64>,
}

/// `entries.delete` — an entry was deleted.
pub struct EntryDeleteEvent;

impl EventDescriptor for EntryDeleteEvent {
    fn key(&self) -> &str {
        "entries.delete"
    }

    fn title(&self) -> &str {
        "When an entry is deleted"
    }

    fn description(&self) -> &str {
        "Triggered when an entry is deleted."
    }

    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob> {
        let options: EntryDeleteOptions = parse_options(self.key(), raw)?;
        OptionsBlob::encode(&options)
    }

    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        _params: &EventParams,
    ) -> Result<bool> {
        let options: EntryDeleteOptions = options.decode()?;
        Ok(scalar_selected(&options.section_ids, entity.attr_i64("section_id")))
    }
}

/// Options for [`UserSaveEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSaveOptions {
    /// Group ids to match against the user's groups. Empty matches
    /// every user.
    #[serde(default)]
    pub group_ids: Vec<i64>,
    /// Match only when the save created the user.
    #[serde(default)]
    pub when_new: bool,
    /// Match only when the save updated an existing user.
    #[serde(default)]
    pub when_updated: bool,
}

/// `users.save` — a user account was created or updated.
pub struct UserSaveEvent;

impl EventDescriptor for UserSaveEvent {
    fn key(&self) -> &str {
        "users.save"
    }

    fn title(&self) -> &str {
        "When a user is saved"
    }

    fn description(&self) -> &str {
        "Triggered when a user is created or updated."
    }

    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob> {
        let options: UserSaveOptions = parse_options(self.key(), raw)?;
        OptionsBlob::encode(&options)
    }

    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        params: &EventParams,
    ) -> Result<bool> {
        let options: UserSaveOptions = options.decode()?;
        if !save_kind_matches(options.when_new, options.when_updated, params.is_new) {
            return Ok(false);
        }
        Ok(any_selected(&options.group_ids, &entity.attr_i64_list("group_ids")))
    }
}

/// Options for [`UserActivateEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivateOptions {
    /// Group ids to match against the user's groups. Empty matches
    /// every user.
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// `users.activate` — a user account was activated.
pub struct UserActivateEvent;

impl EventDescriptor for UserActivateEvent {
    fn key(&self) -> &str {
        "users.activate"
    }

    fn title(&self) -> &str {
        "When a user is activated"
    }

    fn description(&self) -> &str {
        "Triggered when a user is activated."
    }

    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob> {
        let options: UserActivateOptions = parse_options(self.key(), raw)?;
        OptionsBlob::encode(&options)
    }

    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        _params: &EventParams,
    ) -> Result<bool> {
        let options: UserActivateOptions = options.decode()?;
        Ok(any_selected(&options.group_ids, &entity.attr_i64_list("group_ids")))
    }
}

/// Options for [`UserDeleteEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleteOptions {
    /// Group ids to match against the user's groups. Empty matches
    /// every user.
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// `users.delete` — a user account was deleted.
pub struct UserDeleteEvent;

impl EventDescriptor for UserDeleteEvent {
    fn key(&self) -> &str {
        "users.delete"
    }

    fn title(&self) -> &str {
        "When a user is deleted"
    }

    fn description(&self) -> &str {
        "Triggered when a user is deleted."
    }

    fn prepare_options(&self, raw: &serde_json::Value) -> Result<OptionsBlob> {
        let options: UserDeleteOptions = parse_options(self.key(), raw)?;
        OptionsBlob::encode(&options)
    }

    fn validate(
        &self,
        options: &OptionsBlob,
        entity: &Entity,
        _params: &EventParams,
    ) -> Result<bool> {
        let options: UserDeleteOptions = options.decode()?;
        Ok(any_selected(&options.group_ids, &entity.attr_i64_list("group_ids")))
    }
}

/// `users.login` — a user signed in. Carries no options; every
/// enabled binding matches.
pub struct UserLoginEvent;

impl EventDescriptor for UserLoginEvent {
    fn key(&self) -> &str {
        "users.login"
    }

    fn title(&self) -> &str {
        "When a user logs in"
    }

    fn description(&self) -> &str {
        "Triggered when a user signs in."
    }

    fn prepare_options(&self, _raw: &serde_json::Value) -> Result<OptionsBlob> {
        Ok(OptionsBlob::empty())
    }

    fn validate(
        &self,
        _options: &OptionsBlob,
        _entity: &Entity,
        _params: &EventParams,
    ) -> Result<bool> {
        Ok(true)
    }
}
