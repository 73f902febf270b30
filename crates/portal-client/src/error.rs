use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failures and timeouts.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success envelope.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid server url: {0}")]
    BadUrl(String),
}

impl ClientError {
    /// What to show the person at the keyboard: the server's own message
    /// when it sent one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}
