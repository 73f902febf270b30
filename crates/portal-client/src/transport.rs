use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use portal_types::api::{
    ConversationMessage, EditMessageRequest, Envelope, SendMessageRequest, UserEntry,
};

use crate::error::ClientError;

/// Directory answer: who the caller is, and who else they can message.
#[derive(Debug, Clone)]
pub struct UserListing {
    pub me: i64,
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone)]
pub struct ConversationPage {
    pub me: i64,
    pub messages: Vec<ConversationMessage>,
}

/// The calls the conversation client makes. [`HttpApi`] is the real one.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// An empty `filter` lists everyone.
    async fn list_users(&self, filter: &str) -> Result<UserListing, ClientError>;

    async fn conversation(&self, other_user_id: i64) -> Result<ConversationPage, ClientError>;

    async fn send(&self, recipient_id: i64, body: &str) -> Result<(), ClientError>;

    async fn edit(&self, message_id: i64, body: &str) -> Result<(), ClientError>;

    async fn unsend(&self, message_id: i64) -> Result<(), ClientError>;
}

/// JSON-over-HTTP transport with a bearer session token.
pub struct HttpApi {
    client: Client,
    base: Url,
    token: String,
}

impl HttpApi {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::BadUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::BadUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base,
            token: token.into(),
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::BadUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn exchange<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Envelope<T>, ClientError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let http_status = resp.status();
        let bytes = resp.bytes().await?;

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !http_status.is_success() => {
                return Err(ClientError::Api {
                    status: http_status.as_u16(),
                    message: http_status.canonical_reason().unwrap_or_default().to_string(),
                });
            }
            Err(e) => return Err(ClientError::Decode(e)),
        };

        if !envelope.is_success() {
            return Err(ClientError::Api {
                status: envelope.status,
                message: envelope.message.unwrap_or_default(),
            });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl MessagingApi for HttpApi {
    async fn list_users(&self, filter: &str) -> Result<UserListing, ClientError> {
        let url = if filter.is_empty() {
            self.url(&["usernames"])?
        } else {
            self.url(&["usernames", filter])?
        };

        let envelope: Envelope<Vec<UserEntry>> = self.exchange(self.client.get(url)).await?;
        Ok(UserListing {
            me: envelope.me.unwrap_or_default(),
            users: envelope.data.unwrap_or_default(),
        })
    }

    async fn conversation(&self, other_user_id: i64) -> Result<ConversationPage, ClientError> {
        let url = self.url(&["messages", "user", &other_user_id.to_string()])?;

        let envelope: Envelope<Vec<ConversationMessage>> = self.exchange(self.client.get(url)).await?;
        Ok(ConversationPage {
            me: envelope.me.unwrap_or_default(),
            messages: envelope.data.unwrap_or_default(),
        })
    }

    async fn send(&self, recipient_id: i64, body: &str) -> Result<(), ClientError> {
        let url = self.url(&["messages"])?;
        let req = SendMessageRequest {
            recipient_id: Some(recipient_id),
            message: Some(body.to_string()),
        };

        self.exchange::<serde_json::Value>(self.client.post(url).json(&req)).await?;
        Ok(())
    }

    async fn edit(&self, message_id: i64, body: &str) -> Result<(), ClientError> {
        let url = self.url(&["messages", &message_id.to_string()])?;
        let req = EditMessageRequest {
            message: Some(body.to_string()),
        };

        self.exchange::<serde_json::Value>(self.client.put(url).json(&req)).await?;
        Ok(())
    }

    async fn unsend(&self, message_id: i64) -> Result<(), ClientError> {
        let url = self.url(&["messages", &message_id.to_string()])?;

        self.exchange::<serde_json::Value>(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(base, "t", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn urls_extend_the_base_path() {
        let api = api("http://localhost:3000/portal/api/");
        assert_eq!(
            api.url(&["messages", "user", "5"]).unwrap().as_str(),
            "http://localhost:3000/portal/api/messages/user/5"
        );
    }

    #[test]
    fn filter_segment_is_percent_encoded() {
        let api = api("http://localhost:3000");
        assert_eq!(
            api.url(&["usernames", "a b/c"]).unwrap().as_str(),
            "http://localhost:3000/usernames/a%20b%2Fc"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(HttpApi::new("mailto:someone@example.com", "t", Duration::from_secs(1)).is_err());
        assert!(HttpApi::new("not a url", "t", Duration::from_secs(1)).is_err());
    }
}
