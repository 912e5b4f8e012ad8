use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::common::{Message, OutgoingMessage, UnreadCount, User};
use crate::error::{ChatError, ChatResult};

/// REST side of the chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat_users(&self) -> ChatResult<Vec<User>>;
    async fn unread_counts(&self) -> ChatResult<Vec<UnreadCount>>;
    async fn conversation(&self, peer_id: &str) -> ChatResult<Vec<Message>>;
    async fn send_message(&self, outgoing: OutgoingMessage) -> ChatResult<Message>;
    async fn edit_message(&self, message_id: &str, text: &str) -> ChatResult<Message>;
    async fn delete_message(&self, message_id: &str) -> ChatResult<()>;
}

/// `ChatBackend` over the hotel backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> ChatResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        })
    }

    pub fn endpoint(&self, path: &str) -> ChatResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ChatResult<T> {
        let request = self.authorized(self.client.get(self.endpoint(path)?));
        let response = check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Map non-success statuses to errors, keeping the body for the message.
async fn check(response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => ChatError::Unauthorized,
        StatusCode::FORBIDDEN => ChatError::Forbidden(body),
        _ => ChatError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat_users(&self) -> ChatResult<Vec<User>> {
        self.get_json("api/users/chat").await
    }

    async fn unread_counts(&self) -> ChatResult<Vec<UnreadCount>> {
        self.get_json("api/chat/unread-counts").await
    }

    async fn conversation(&self, peer_id: &str) -> ChatResult<Vec<Message>> {
        self.get_json(&format!("api/chat/{peer_id}")).await
    }

    async fn send_message(&self, outgoing: OutgoingMessage) -> ChatResult<Message> {
        let mut form = Form::new()
            .text("receiver", outgoing.receiver)
            .text("message", outgoing.text);

        if let Some(file) = outgoing.file {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime_type)?;
            form = form.part("file", part);
        }
        if let Some(reply_to) = outgoing.reply_to {
            form = form.text("replyTo", reply_to);
        }

        let request = self.authorized(self.client.post(self.endpoint("api/chat")?).multipart(form));
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn edit_message(&self, message_id: &str, text: &str) -> ChatResult<Message> {
        let request = self.authorized(
            self.client
                .put(self.endpoint(&format!("api/chat/{message_id}"))?)
                .json(&json!({ "message": text })),
        );
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete_message(&self, message_id: &str) -> ChatResult<()> {
        let request = self.authorized(
            self.client
                .delete(self.endpoint(&format!("api/chat/{message_id}"))?),
        );
        check(request.send().await?).await?;
        Ok(())
    }
}
