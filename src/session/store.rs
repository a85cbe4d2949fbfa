//! Chat store contract and its HTTP client.
//!
//! The controller only ever talks to the backend through [`ChatStore`];
//! [`HttpChatStore`] is the production implementation against the REST
//! surface, and tests substitute an in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use planner_core::models::{ChatSession, Message, Role, User};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity for one signed-in user: created on successful auth, dropped on
/// sign-out, and passed explicitly to every operation that needs it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Chat not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("storage failure: {0}")]
    Other(String),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn list_chats(&self, ctx: &AuthContext) -> Result<Vec<ChatSession>, StoreError>;
    async fn create_chat(&self, ctx: &AuthContext) -> Result<ChatSession, StoreError>;
    async fn list_messages(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
    ) -> Result<Vec<Message>, StoreError>;
    async fn append_message(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError>;
    async fn delete_chat(&self, ctx: &AuthContext, chat_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ChatStore + ?Sized> ChatStore for std::sync::Arc<T> {
    async fn list_chats(&self, ctx: &AuthContext) -> Result<Vec<ChatSession>, StoreError> {
        (**self).list_chats(ctx).await
    }

    async fn create_chat(&self, ctx: &AuthContext) -> Result<ChatSession, StoreError> {
        (**self).create_chat(ctx).await
    }

    async fn list_messages(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        (**self).list_messages(ctx, chat_id).await
    }

    async fn append_message(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        (**self).append_message(ctx, chat_id, role, content).await
    }

    async fn delete_chat(&self, ctx: &AuthContext, chat_id: Uuid) -> Result<(), StoreError> {
        (**self).delete_chat(ctx, chat_id).await
    }
}

/// Client for the `/api` REST surface.
pub struct HttpChatStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpChatStore {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signs up a new account and returns a ready-to-use context.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthContext, StoreError> {
        let response = self
            .http
            .post(self.url("/api/auth/signup"))
            .json(&json!({ "email": email, "password": password, "name": name }))
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        auth_context(response).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthContext, StoreError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        auth_context(response).await
    }
}

#[async_trait]
impl ChatStore for HttpChatStore {
    async fn list_chats(&self, ctx: &AuthContext) -> Result<Vec<ChatSession>, StoreError> {
        let response = self
            .http
            .get(self.url("/api/chats"))
            .bearer_auth(&ctx.token)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        parse_response(response).await
    }

    async fn create_chat(&self, ctx: &AuthContext) -> Result<ChatSession, StoreError> {
        let response = self
            .http
            .post(self.url("/api/chats"))
            .bearer_auth(&ctx.token)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        parse_response(response).await
    }

    async fn list_messages(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        let response = self
            .http
            .get(self.url(&format!("/api/chats/{chat_id}/messages")))
            .bearer_auth(&ctx.token)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        parse_response(response).await
    }

    async fn append_message(
        &self,
        ctx: &AuthContext,
        chat_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        let response = self
            .http
            .post(self.url(&format!("/api/chats/{chat_id}/messages")))
            .bearer_auth(&ctx.token)
            .json(&json!({ "role": role, "content": content }))
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        parse_response(response).await
    }

    async fn delete_chat(&self, ctx: &AuthContext, chat_id: Uuid) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/chats/{chat_id}")))
            .bearer_auth(&ctx.token)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponseBody {
    token: String,
    user: User,
}

async fn auth_context(response: reqwest::Response) -> Result<AuthContext, StoreError> {
    let body: AuthResponseBody = parse_response(response).await?;
    Ok(AuthContext {
        token: body.token,
        user: body.user,
    })
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StoreError> {
    let response = check(response).await?;
    response
        .json()
        .await
        .map_err(|e| StoreError::Other(e.to_string()))
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|b| b.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));

    Err(match status.as_u16() {
        401 => StoreError::Unauthorized,
        403 => StoreError::Forbidden,
        404 => StoreError::NotFound,
        400 => StoreError::BadRequest(message),
        _ => StoreError::Other(message),
    })
}
