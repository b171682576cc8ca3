pub mod followup;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

pub const FLAG_EPHEMERAL: u64 = 64;

pub const OPTION_SUB_COMMAND: u8 = 1;
pub const OPTION_SUB_COMMAND_GROUP: u8 = 2;
pub const OPTION_STRING: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    Command,
    Unsupported(u8),
}

/// Inbound interaction payload. Lives for one request/response cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub id: String,
    /// Reply token keying the follow-up webhook.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub data: Option<CommandData>,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self.kind {
            INTERACTION_PING => InteractionKind::Ping,
            INTERACTION_APPLICATION_COMMAND => InteractionKind::Command,
            other => InteractionKind::Unsupported(other),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// One node of the option tree: a subcommand group, a subcommand, or a typed leaf.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl CommandOption {
    /// Leaf value rendered as text. Empty strings count as absent.
    pub fn text_value(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Synchronous reply to an interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseData {
    pub content: String,
    pub flags: u64,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn deferred() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: None,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: content.into(),
                flags: FLAG_EPHEMERAL,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupMessage {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_shapes_match_wire_format() {
        assert_eq!(serde_json::to_value(InteractionResponse::pong()).unwrap(), json!({"type": 1}));
        assert_eq!(
            serde_json::to_value(InteractionResponse::deferred()).unwrap(),
            json!({"type": 5})
        );
        assert_eq!(
            serde_json::to_value(InteractionResponse::ephemeral("nope")).unwrap(),
            json!({"type": 4, "data": {"content": "nope", "flags": 64}})
        );
    }

    #[test]
    fn interaction_parses_nested_options() {
        let raw = json!({
            "type": 2,
            "id": "i-1",
            "token": "tok",
            "data": {
                "name": "admin",
                "options": [{
                    "name": "users", "type": 2,
                    "options": [{
                        "name": "make-admin", "type": 1,
                        "options": [
                            {"name": "user", "type": 3, "value": "a@x.com"},
                            {"name": "status", "type": 5, "value": true}
                        ]
                    }]
                }]
            }
        });
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        assert_eq!(interaction.kind(), InteractionKind::Command);
        let data = interaction.data.unwrap();
        let leaf = &data.options[0].options[0].options;
        assert_eq!(leaf[0].text_value().as_deref(), Some("a@x.com"));
        assert_eq!(leaf[1].text_value().as_deref(), Some("true"));
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let interaction: Interaction = serde_json::from_value(json!({"type": 3})).unwrap();
        assert_eq!(interaction.kind(), InteractionKind::Unsupported(3));
    }

    #[test]
    fn blank_string_value_is_absent() {
        let option: CommandOption =
            serde_json::from_value(json!({"name": "email", "type": 3, "value": "  "})).unwrap();
        assert!(option.text_value().is_none());
    }
}
