//! Content rendering
//!
//! Renders a campaign definition's templated fields for one send.
//! Every field renders independently: a broken optional field falls
//! back instead of blocking delivery, and only the required fields
//! (subject, body) can abort a send.

use async_trait::async_trait;
use herald_common::types::{Entity, EventParams};
use herald_common::{Error, Result};
use herald_storage::models::CampaignDefinition;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Values a template renders against.
pub struct RenderContext<'a> {
    pub entity: &'a Entity,
    pub params: &'a EventParams,
    /// Per-send values layered over the event, e.g. the recipient.
    pub extra: serde_json::Map<String, Value>,
}

impl<'a> RenderContext<'a> {
    pub fn new(entity: &'a Entity, params: &'a EventParams) -> Self {
        Self {
            entity,
            params,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Resolve a placeholder path.
    ///
    /// `entity.id` and `entity.type` come from the entity itself,
    /// `entity.<attr>` from its attribute map, `is_new` from the event
    /// params. Bare names check the per-send values first, then the
    /// event's extra params.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if let Some(attr) = path.strip_prefix("entity.") {
            return match attr {
                "id" => Some(Value::String(self.entity.id.clone())),
                "type" => Some(Value::String(self.entity.entity_type.clone())),
                _ => self.entity.attributes.get(attr).cloned(),
            };
        }
        if path == "is_new" {
            return Some(Value::Bool(self.params.is_new));
        }
        if let Some(value) = self.extra.get(path) {
            return Some(value.clone());
        }
        self.params.extra.get(path).cloned()
    }
}

/// Pluggable template engine.
///
/// The contract is async so host implementations can load partials or
/// call out while rendering; the built-in renderer is pure.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, source: &str, context: &RenderContext<'_>) -> Result<String>;
}

/// Built-in `{{name}}` substitution engine.
///
/// Unresolvable placeholders render as empty strings rather than
/// leaking raw `{{...}}` markers into outgoing mail.
pub struct PlaceholderRenderer;

#[async_trait]
impl TemplateRenderer for PlaceholderRenderer {
    async fn render(&self, source: &str, context: &RenderContext<'_>) -> Result<String> {
        let placeholder = Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").unwrap();
        let rendered = placeholder.replace_all(source, |caps: &regex::Captures<'_>| {
            context
                .lookup(&caps[1])
                .map(|value| value_to_string(&value))
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => value.to_string(),
    }
}

/// The content fields rendered for each send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentField {
    Subject,
    FromName,
    FromEmail,
    ReplyTo,
    Body,
    HtmlBody,
}

impl ContentField {
    /// Required fields abort the whole send when they fail to render.
    pub fn is_required(&self) -> bool {
        matches!(self, ContentField::Subject | ContentField::Body)
    }
}

impl std::fmt::Display for ContentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContentField::Subject => "subject",
            ContentField::FromName => "from_name",
            ContentField::FromEmail => "from_email",
            ContentField::ReplyTo => "reply_to",
            ContentField::Body => "body",
            ContentField::HtmlBody => "html_body",
        };
        write!(f, "{}", name)
    }
}

/// Fully rendered content for one send.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    pub subject_line: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
}

/// Render every content field of a definition independently.
///
/// Subject and body failures return `Error::Render` for the caller to
/// absorb. Sender fields keep their stored value when rendering fails;
/// a broken HTML body is dropped so the plain-text part still goes out.
pub async fn render_content(
    renderer: &dyn TemplateRenderer,
    definition: &CampaignDefinition,
    context: &RenderContext<'_>,
) -> Result<RenderedContent> {
    let subject_line =
        render_required(renderer, ContentField::Subject, &definition.subject_template, context)
            .await?;
    let body =
        render_required(renderer, ContentField::Body, &definition.body_template, context).await?;

    let from_name = match &definition.from_name {
        Some(source) => {
            Some(render_optional(renderer, ContentField::FromName, source, context).await)
        }
        None => None,
    };
    let from_email =
        render_optional(renderer, ContentField::FromEmail, &definition.from_email, context).await;
    let reply_to = match &definition.reply_to_email {
        Some(source) => {
            Some(render_optional(renderer, ContentField::ReplyTo, source, context).await)
        }
        None => None,
    };

    let html_body = match &definition.html_body_template {
        Some(source) => match renderer.render(source, context).await {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                debug!(
                    field = %ContentField::HtmlBody,
                    error = %e,
                    "HTML body failed to render, sending text only"
                );
                None
            }
        },
        None => None,
    };

    Ok(RenderedContent {
        subject_line,
        from_name,
        from_email,
        reply_to,
        body,
        html_body,
    })
}

async fn render_required(
    renderer: &dyn TemplateRenderer,
    field: ContentField,
    source: &str,
    context: &RenderContext<'_>,
) -> Result<String> {
    renderer
        .render(source, context)
        .await
        .map_err(|e| Error::render(field, e.to_string()))
}

async fn render_optional(
    renderer: &dyn TemplateRenderer,
    field: ContentField,
    source: &str,
    context: &RenderContext<'_>,
) -> String {
    match renderer.render(source, context).await {
        Ok(rendered) => rendered,
        Err(e) => {
            debug!(
                field = %field,
                error = %e,
                "Optional field failed to render, keeping stored value"
            );
            source.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_common::types::RecipientsSpec;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    /// Fails on any source containing `[boom]`, otherwise substitutes.
    struct FragileRenderer;

    #[async_trait]
    impl TemplateRenderer for FragileRenderer {
        async fn render(&self, source: &str, context: &RenderContext<'_>) -> Result<String> {
            if source.contains("[boom]") {
                return Err(Error::Internal("template engine exploded".to_string()));
            }
            PlaceholderRenderer.render(source, context).await
        }
    }

    fn entry() -> Entity {
        Entity::new("entry", "42")
            .with_attr("title", json!("Launch day"))
            .with_attr("section_id", json!(3))
            .with_attr("featured", json!(true))
    }

    fn definition() -> CampaignDefinition {
        CampaignDefinition {
            id: Uuid::new_v4(),
            name: "Announcement".to_string(),
            mailer_name: "defaultmailer".to_string(),
            subject_template: "New: {{entity.title}}".to_string(),
            from_name: Some("{{entity.title}} desk".to_string()),
            from_email: "noreply@example.com".to_string(),
            reply_to_email: None,
            cc: Vec::new(),
            bcc: Vec::new(),
            body_template: "Entry {{entity.id}} in section {{entity.section_id}}".to_string(),
            html_body_template: Some("<p>{{entity.title}}</p>".to_string()),
            recipients: RecipientsSpec::default(),
            enable_attachments: false,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_placeholder_substitution() {
        let entity = entry();
        let params = EventParams::new().with_is_new(true);
        let context = RenderContext::new(&entity, &params);

        let rendered = PlaceholderRenderer
            .render("{{entity.title}} ({{ entity.section_id }}, new: {{is_new}})", &context)
            .await
            .unwrap();

        assert_eq!(rendered, "Launch day (3, new: true)");
    }

    #[tokio::test]
    async fn test_unresolved_placeholders_render_empty() {
        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let rendered = PlaceholderRenderer
            .render("Hello {{nobody}}!", &context)
            .await
            .unwrap();

        assert_eq!(rendered, "Hello !");
    }

    #[tokio::test]
    async fn test_lookup_precedence() {
        let entity = entry();
        let params = EventParams::new().with_extra("email", json!("from-params@example.com"));
        let context =
            RenderContext::new(&entity, &params).with_extra("email", json!("per-send@example.com"));

        // Per-send values shadow event params.
        let rendered = PlaceholderRenderer.render("{{email}}", &context).await.unwrap();
        assert_eq!(rendered, "per-send@example.com");

        let context = RenderContext::new(&entity, &params);
        let rendered = PlaceholderRenderer.render("{{email}}", &context).await.unwrap();
        assert_eq!(rendered, "from-params@example.com");
    }

    #[tokio::test]
    async fn test_entity_id_and_bool_formatting() {
        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let rendered = PlaceholderRenderer
            .render("{{entity.id}}/{{entity.type}}/{{entity.featured}}", &context)
            .await
            .unwrap();

        assert_eq!(rendered, "42/entry/true");
    }

    #[tokio::test]
    async fn test_render_content_all_fields() {
        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let content = render_content(&PlaceholderRenderer, &definition(), &context)
            .await
            .unwrap();

        assert_eq!(content.subject_line, "New: Launch day");
        assert_eq!(content.from_name.as_deref(), Some("Launch day desk"));
        assert_eq!(content.from_email, "noreply@example.com");
        assert_eq!(content.body, "Entry 42 in section 3");
        assert_eq!(content.html_body.as_deref(), Some("<p>Launch day</p>"));
        assert_eq!(content.reply_to, None);
    }

    #[tokio::test]
    async fn test_required_field_failure_aborts() {
        let mut definition = definition();
        definition.subject_template = "[boom] {{entity.title}}".to_string();

        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let err = render_content(&FragileRenderer, &definition, &context)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "RENDER_ERROR");
        match err {
            Error::Render { field, .. } => assert_eq!(field, "subject"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_optional_field_falls_back_to_stored_value() {
        let mut definition = definition();
        definition.from_name = Some("[boom] desk".to_string());

        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let content = render_content(&FragileRenderer, &definition, &context)
            .await
            .unwrap();

        assert_eq!(content.from_name.as_deref(), Some("[boom] desk"));
        assert_eq!(content.subject_line, "New: Launch day");
    }

    #[tokio::test]
    async fn test_broken_html_body_dropped() {
        let mut definition = definition();
        definition.html_body_template = Some("[boom] <p></p>".to_string());

        let entity = entry();
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let content = render_content(&FragileRenderer, &definition, &context)
            .await
            .unwrap();

        assert_eq!(content.html_body, None);
        assert_eq!(content.body, "Entry 42 in section 3");
    }

    #[test]
    fn test_required_fields() {
        assert!(ContentField::Subject.is_required());
        assert!(ContentField::Body.is_required());
        assert!(!ContentField::FromName.is_required());
        assert!(!ContentField::HtmlBody.is_required());
    }
}
