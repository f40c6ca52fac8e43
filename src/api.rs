//! REST API client for the chat backend

use crate::error::{ClientError, Result};
use crate::models::{
    Chat, ChatCreate, ChatId, ChatUpdate, LoginRequest, Message, MessageCreate, RegisterRequest,
    SendMessageRequest, SendMessageResponse, TokenResponse, User,
};
use crate::session::SessionHandle;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client for every backend endpoint.
///
/// Attaches the session's bearer token to each call. A 401 from any endpoint
/// expires the session before the error reaches the caller.
pub struct ChatApi {
    client: Client,
    base_url: String,
    session: SessionHandle,
}

impl ChatApi {
    /// Create a client for `server_url`; endpoints live under `{server_url}/api`
    pub fn new(server_url: &str, session: SessionHandle) -> Result<Self> {
        Self::with_timeout(server_url, session, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, session: SessionHandle, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/api", server_url.trim_end_matches('/')),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    // ---- auth ----

    /// Register a new account; does not log in
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(ClientError::ValidationError(
                "Username and password are required".to_string(),
            ));
        }
        let user: User = self
            .send(self.request(Method::POST, "/auth/register").json(request))
            .await?;
        log::info!("Registered user {}", user.username);
        Ok(user)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse> {
        self.send(self.request(Method::POST, "/auth/login").json(request))
            .await
    }

    /// The user the current token belongs to
    pub async fn current_user(&self) -> Result<User> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    // ---- chats ----

    pub async fn create_chat(&self, request: &ChatCreate) -> Result<Chat> {
        if request.title.trim().is_empty() {
            return Err(ClientError::ValidationError("Chat title cannot be empty".to_string()));
        }
        self.send(self.request(Method::POST, "/chat/").json(request))
            .await
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        self.send(self.request(Method::GET, "/chat/")).await
    }

    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Chat> {
        check_chat_id(chat_id)?;
        self.send(self.request(Method::GET, &format!("/chat/{}", chat_id)))
            .await
    }

    pub async fn update_chat(&self, chat_id: ChatId, update: &ChatUpdate) -> Result<Chat> {
        check_chat_id(chat_id)?;
        if matches!(&update.title, Some(title) if title.trim().is_empty()) {
            return Err(ClientError::ValidationError("Chat title cannot be empty".to_string()));
        }
        self.send(
            self.request(Method::PUT, &format!("/chat/{}", chat_id))
                .json(update),
        )
        .await
    }

    pub async fn delete_chat(&self, chat_id: ChatId) -> Result<()> {
        check_chat_id(chat_id)?;
        self.send_empty(self.request(Method::DELETE, &format!("/chat/{}", chat_id)))
            .await
    }

    // ---- messages ----

    /// Store a raw message without generating a reply
    pub async fn create_message(&self, request: &MessageCreate) -> Result<Message> {
        check_chat_id(request.chat_id)?;
        check_content(&request.content)?;
        self.send(
            self.request(Method::POST, &format!("/chat/{}/messages", request.chat_id))
                .json(request),
        )
        .await
    }

    pub async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>> {
        check_chat_id(chat_id)?;
        self.send(self.request(Method::GET, &format!("/chat/{}/messages", chat_id)))
            .await
    }

    /// Store a user message and receive it together with the assistant reply
    pub async fn send_message(&self, chat_id: ChatId, content: &str) -> Result<SendMessageResponse> {
        check_chat_id(chat_id)?;
        check_content(content)?;
        let request = SendMessageRequest {
            content: content.to_string(),
        };
        self.send(
            self.request(Method::POST, &format!("/chat/{}/send-message", chat_id))
                .json(&request),
        )
        .await
    }

    // ---- plumbing ----

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));

        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.execute(builder).await?;
        Ok(())
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            log::warn!("Request failed: {}", e);
            ClientError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        log::debug!("{} returned {}: {}", url, status, body);

        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
        }

        Err(ClientError::from_status(status, &body))
    }
}

fn check_chat_id(chat_id: ChatId) -> Result<()> {
    if chat_id.0 <= 0 {
        return Err(ClientError::ValidationError(format!("Invalid chat id: {}", chat_id)));
    }
    Ok(())
}

fn check_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(ClientError::ValidationError("Message content cannot be empty".to_string()));
    }
    Ok(())
}
