//! Typed messages returned to the host.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use schemars::JsonSchema;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// One output message of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolMessage {
    /// Plain text
    Text { text: String },
    /// Structured JSON payload
    Json { json: JsonValue },
    /// File attachment; `data` is base64-encoded on the wire
    Blob {
        #[serde(serialize_with = "serialize_base64")]
        #[schemars(with = "String")]
        data: Vec<u8>,
        mime_type: String,
        filename: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        encoding: Option<String>,
    },
}

impl ToolMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn json(json: JsonValue) -> Self {
        Self::Json { json }
    }

    pub fn blob(data: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::Blob {
            data,
            mime_type: mime_type.into(),
            filename: filename.into(),
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, value: impl Into<String>) -> Self {
        if let Self::Blob { encoding, .. } = &mut self {
            *encoding = Some(value.into());
        }
        self
    }

    /// Text content, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

fn serialize_base64<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    STANDARD.encode(bytes).serialize(serializer)
}
