use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reply shown in place of an assistant answer when a query fails.
pub const ERROR_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
}

/// A document that informed an assistant answer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "SourceRepr")]
pub struct Source {
    pub title: String,
}

// The backend sends either bare titles or objects carrying a title.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceRepr {
    Title(String),
    Object { title: String },
}

impl From<SourceRepr> for Source {
    fn from(repr: SourceRepr) -> Self {
        match repr {
            SourceRepr::Title(title) | SourceRepr::Object { title } => Source { title },
        }
    }
}

/// Whether an optimistically appended user turn has been acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Confirmed,
    /// The query carrying this turn failed; the backend may never have stored it.
    Unconfirmed,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User {
        id: Uuid,
        content: String,
        timestamp: DateTime<Utc>,
        delivery: Delivery,
    },
    Assistant {
        id: Uuid,
        content: String,
        timestamp: DateTime<Utc>,
        sources: Vec<Source>,
    },
    AssistantError {
        id: Uuid,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    pub fn pending_user(content: impl Into<String>) -> Self {
        Message::User {
            id: Uuid::new_v4(),
            content: content.into(),
            timestamp: Utc::now(),
            delivery: Delivery::Pending,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Message::Assistant {
            id: Uuid::new_v4(),
            content: content.into(),
            timestamp: Utc::now(),
            sources,
        }
    }

    pub fn assistant_error() -> Self {
        Message::AssistantError {
            id: Uuid::new_v4(),
            content: ERROR_REPLY.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Message::User { id, .. }
            | Message::Assistant { id, .. }
            | Message::AssistantError { id, .. } => *id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::AssistantError { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::User { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::AssistantError { timestamp, .. } => *timestamp,
        }
    }

    pub fn sources(&self) -> &[Source] {
        match self {
            Message::Assistant { sources, .. } => sources,
            _ => &[],
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Message::AssistantError { .. })
    }

    /// Convert a stored message. Roles other than user/assistant are dropped.
    pub fn from_wire(wire: WireMessage) -> Option<Self> {
        let timestamp = wire
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        let id = Uuid::new_v4();
        match (wire.role.as_str(), wire.error) {
            ("user", _) => Some(Message::User {
                id,
                content: wire.content,
                timestamp,
                delivery: Delivery::Confirmed,
            }),
            ("assistant", true) => Some(Message::AssistantError {
                id,
                content: wire.content,
                timestamp,
            }),
            ("assistant", false) => Some(Message::Assistant {
                id,
                content: wire.content,
                timestamp,
                sources: wire.sources,
            }),
            (role, _) => {
                tracing::debug!(role, "skipping message with unsupported role");
                None
            }
        }
    }
}

/// Message as the backend stores it.
#[derive(Debug, Deserialize, Clone)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, alias = "context_sources")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub error: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Accepts RFC 3339 and the backend's naive ISO form (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ModelId {
    #[serde(rename = "anthropic.claude-3-sonnet-20240229-v1:0")]
    ClaudeSonnet,
    #[serde(rename = "anthropic.claude-3-haiku-20240307-v1:0")]
    ClaudeHaiku,
    #[serde(rename = "anthropic.claude-3-opus-20240229-v1:0")]
    ClaudeOpus,
    #[serde(rename = "amazon.titan-text-express-v1")]
    TitanTextExpress,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [
        ModelId::ClaudeSonnet,
        ModelId::ClaudeHaiku,
        ModelId::ClaudeOpus,
        ModelId::TitanTextExpress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::ClaudeSonnet => "anthropic.claude-3-sonnet-20240229-v1:0",
            ModelId::ClaudeHaiku => "anthropic.claude-3-haiku-20240307-v1:0",
            ModelId::ClaudeOpus => "anthropic.claude-3-opus-20240229-v1:0",
            ModelId::TitanTextExpress => "amazon.titan-text-express-v1",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::ClaudeSonnet => "Claude 3 Sonnet",
            ModelId::ClaudeHaiku => "Claude 3 Haiku",
            ModelId::ClaudeOpus => "Claude 3 Opus",
            ModelId::TitanTextExpress => "Amazon Titan Text Express",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Unsupported model: {}", s))
    }
}

/// Model invocation parameters, persisted wholesale under one key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub model_id: ModelId,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_id: ModelId::ClaudeSonnet,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(json: &str) -> WireMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_wire_roles_map_to_variants() {
        let user = Message::from_wire(wire(
            r#"{"role":"user","content":"Hello","timestamp":"2023-01-01T00:00:00Z"}"#,
        ))
        .unwrap();
        assert!(matches!(
            user,
            Message::User {
                delivery: Delivery::Confirmed,
                ..
            }
        ));
        assert_eq!(user.timestamp().to_rfc3339(), "2023-01-01T00:00:00+00:00");

        let failed = Message::from_wire(wire(
            r#"{"role":"assistant","content":"oops","error":true}"#,
        ))
        .unwrap();
        assert!(failed.is_error());

        assert!(Message::from_wire(wire(r#"{"role":"system","content":"x"}"#)).is_none());
    }

    #[test]
    fn test_sources_accept_titles_and_objects() {
        let msg = Message::from_wire(wire(
            r#"{"role":"assistant","content":"a","context_sources":["Guide",{"title":"FAQ","score":0.8}]}"#,
        ))
        .unwrap();
        let titles: Vec<_> = msg.sources().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Guide", "FAQ"]);
    }

    #[test]
    fn test_document_parses_naive_timestamp() {
        let doc: Document = serde_json::from_str(
            r#"{"id":"1","title":"Sample","type":"pdf","tags":["sample"],"created_at":"2024-03-05T10:20:30.123456"}"#,
        )
        .unwrap();
        assert_eq!(doc.kind.as_deref(), Some("pdf"));
        assert_eq!(
            doc.created_at.unwrap().to_rfc3339(),
            "2024-03-05T10:20:30.123456+00:00"
        );

        let bare: Document = serde_json::from_str(r#"{"id":"2","title":"Bare"}"#).unwrap();
        assert!(bare.tags.is_empty());
        assert!(bare.created_at.is_none());
    }

    #[test]
    fn test_settings_wire_keys() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["modelId"], "anthropic.claude-3-sonnet-20240229-v1:0");
        assert_eq!(json["topP"], 0.9);
        assert_eq!(json["maxTokens"], 4000);
    }

    #[test]
    fn test_model_id_parse() {
        assert_eq!(
            "amazon.titan-text-express-v1".parse::<ModelId>(),
            Ok(ModelId::TitanTextExpress)
        );
        assert!("gpt-4o".parse::<ModelId>().is_err());
    }
}
