use serde::{Deserialize, Serialize};

// -- Session --

/// Claims carried by a portal session token. The login flow that issues
/// them lives outside the messaging core; both the API middleware and the
/// dev token helper agree on this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Directory --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub user_id: i64,
    pub username: String,
}

// -- Messages --

/// Body of `POST /messages`. Fields are optional so that a missing field
/// surfaces as a validation error rather than a JSON rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Option<i64>,
    pub message: Option<String>,
}

/// Body of `PUT /messages/{id}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub message: Option<String>,
}

/// One row of a conversation, joined with the sender's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub username: String,
    pub message: String,
    pub date_time: chrono::DateTime<chrono::Utc>,
}

// -- Envelope --

/// Every response body, success or failure. `status` mirrors the HTTP
/// status line; listings fill `data`, acknowledgements and errors fill
/// `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<i64>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

impl<T> Envelope<T> {
    pub fn data(me: i64, data: T) -> Self {
        Self {
            status: 200,
            me: Some(me),
            data: Some(data),
            message: None,
            message_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl Envelope<()> {
    pub fn ack(status: u16, me: i64, message: &str) -> Self {
        Self {
            status,
            me: Some(me),
            data: None,
            message: Some(message.to_string()),
            message_id: None,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            me: None,
            data: None,
            message: Some(message.to_string()),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }
}
