//! REST collaborator: snapshot fetches and find-or-create.
//!
//! Endpoints:
//!   GET  /api/conversations/{userId}
//!   POST /api/conversations            body: {"senderId": "...", "receiverId": "..."}
//!   GET  /api/messages/{conversationId}
//!   GET  /api/users/{excludingUserId}

use std::future::Future;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::{Conversation, ConversationId, Message, UserId, UserRef};
use crate::error::{Result, SyncError};

/// Request/response side of the backend. Every call may be suspended for a
/// while; the engine never awaits one inline.
pub trait ChatApi: Send + Sync + 'static {
    /// Conversation digests for `user`, most recent first.
    fn conversations(&self, user: &UserId) -> impl Future<Output = Result<Vec<Conversation>>> + Send;

    /// Existing two-party conversation for the pair, or a newly created one.
    fn find_or_create(
        &self,
        sender: &UserId,
        receiver: &UserId,
    ) -> impl Future<Output = Result<Conversation>> + Send;

    /// Full log of one conversation, in no guaranteed order.
    fn messages(&self, conversation: &ConversationId) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Every user except `excluding`.
    fn users(&self, excluding: &UserId) -> impl Future<Output = Result<Vec<UserRef>>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindOrCreateBody<'a> {
    sender_id: &'a UserId,
    receiver_id: &'a UserId,
}

/// [`ChatApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("invalid backend URL `{base_url}`: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "backend URL `{base_url}` cannot carry a path"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Build `{base}/api/...` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        decode(response, &url).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &Url) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Status {
            status,
            endpoint: url.path().to_string(),
        });
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl ChatApi for HttpApi {
    async fn conversations(&self, user: &UserId) -> Result<Vec<Conversation>> {
        self.get_json(self.endpoint(&["conversations", user.as_str()]))
            .await
    }

    async fn find_or_create(&self, sender: &UserId, receiver: &UserId) -> Result<Conversation> {
        let url = self.endpoint(&["conversations"]);
        log::debug!("POST {url}");
        let response = self
            .client
            .post(url.clone())
            .json(&FindOrCreateBody {
                sender_id: sender,
                receiver_id: receiver,
            })
            .send()
            .await?;
        decode(response, &url).await
    }

    async fn messages(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        self.get_json(self.endpoint(&["messages", conversation.as_str()]))
            .await
    }

    async fn users(&self, excluding: &UserId) -> Result<Vec<UserRef>> {
        self.get_json(self.endpoint(&["users", excluding.as_str()]))
            .await
    }
}
