use serde::{Deserialize, Serialize};

use crate::api::{Content, Part};

/// Placeholder shown in the assistant slot while a response is pending.
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Role token expected by the remote API. The API calls the assistant
    /// side `model`.
    pub fn to_api_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}

/// Convert a transcript into the request format the API expects.
///
/// Every message becomes one content turn with a single text part. Empty
/// content is kept as an empty part so turn indices stay aligned with the
/// transcript.
pub fn to_api_contents(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .map(|msg| Content {
            role: msg.role.to_api_role().to_string(),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        })
        .collect()
}
