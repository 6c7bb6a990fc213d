//! Common types for Herald

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for campaign definitions
pub type CampaignId = Uuid;

/// Unique identifier for event bindings
pub type BindingId = Uuid;

/// Unique identifier for campaign instances
pub type InstanceId = Uuid;

/// Unique identifier for delivery log entries
pub type DeliveryLogId = Uuid;

/// Unique identifier for mailers
pub type MailerId = String;

/// Qualified event key, e.g. "entries.save"
pub type EventKey = String;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// The subject of a fired lifecycle event.
///
/// Hosts build this from their own records before calling into the
/// engine; validators and template rendering only ever read from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Host-side entity kind, e.g. "entry" or "user"
    pub entity_type: String,

    /// Host-side identifier
    pub id: String,

    /// Attribute map exposed to validators and templates
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl Entity {
    /// Create an entity with an empty attribute map
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            attributes: serde_json::json!({}),
        }
    }

    /// Add an attribute, builder-style
    pub fn with_attr(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(map) = self.attributes.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// Get a string attribute
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer attribute
    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(|v| v.as_i64())
    }

    /// Get a boolean attribute
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(|v| v.as_bool())
    }

    /// Get an integer-list attribute; missing or mistyped yields empty
    pub fn attr_i64_list(&self, key: &str) -> Vec<i64> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default()
    }
}

/// Parameters accompanying a fired event occurrence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventParams {
    /// Whether the triggering operation created the entity
    #[serde(default)]
    pub is_new: bool,

    /// Additional event-specific values
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_is_new(mut self, is_new: bool) -> Self {
        self.is_new = is_new;
        self
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Versioned options envelope stored on a binding.
///
/// Each event descriptor encodes its own typed options struct into
/// `data`. Decoding defaults missing fields, so rows written by an older
/// schema keep validating after the descriptor grows new options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsBlob {
    pub schema_version: u32,
    pub data: serde_json::Value,
}

impl OptionsBlob {
    /// Current envelope version
    pub const VERSION: u32 = 1;

    /// Encode a typed options struct
    pub fn encode<T: Serialize>(options: &T) -> crate::Result<Self> {
        Ok(Self {
            schema_version: Self::VERSION,
            data: serde_json::to_value(options)?,
        })
    }

    /// Decode into a typed options struct
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Empty options for descriptors without configuration
    pub fn empty() -> Self {
        Self {
            schema_version: Self::VERSION,
            data: serde_json::json!({}),
        }
    }
}

/// Recipient specification stored on a campaign definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipientsSpec {
    /// Static addresses; entries starting with '{' are placeholders
    /// resolved at render time
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Named recipient lists owned by the mailer
    #[serde(default)]
    pub lists: Vec<String>,
}

impl RecipientsSpec {
    /// Static addresses only
    pub fn from_addresses(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            lists: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.lists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_attributes() {
        let entity = Entity::new("entry", "42")
            .with_attr("title", serde_json::json!("Hello"))
            .with_attr("section_id", serde_json::json!(3))
            .with_attr("group_ids", serde_json::json!([1, 2]));

        assert_eq!(entity.attr_str("title"), Some("Hello"));
        assert_eq!(entity.attr_i64("section_id"), Some(3));
        assert_eq!(entity.attr_i64_list("group_ids"), vec![1, 2]);
        assert_eq!(entity.attr_i64("missing"), None);
        assert!(entity.attr_i64_list("missing").is_empty());
    }

    #[test]
    fn test_options_blob_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Sample {
            #[serde(default)]
            ids: Vec<i64>,
            #[serde(default)]
            flag: bool,
        }

        let blob = OptionsBlob::encode(&Sample {
            ids: vec![1, 3, 5],
            flag: true,
        })
        .unwrap();
        assert_eq!(blob.schema_version, OptionsBlob::VERSION);

        let decoded: Sample = blob.decode().unwrap();
        assert_eq!(decoded.ids, vec![1, 3, 5]);
        assert!(decoded.flag);
    }

    #[test]
    fn test_options_blob_defaults_missing_fields() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Grown {
            #[serde(default)]
            ids: Vec<i64>,
            #[serde(default)]
            new_field: Option<String>,
        }

        // A row written before `new_field` existed
        let blob = OptionsBlob {
            schema_version: 1,
            data: serde_json::json!({ "ids": [7] }),
        };

        let decoded: Grown = blob.decode().unwrap();
        assert_eq!(decoded.ids, vec![7]);
        assert_eq!(decoded.new_field, None);
    }
}
