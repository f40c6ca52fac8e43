//! Common test utilities for integration tests
//! Spawns an in-memory mock of the chat backend and builds clients against it

#![allow(dead_code)]

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use chat_client::api::ChatApi;
use chat_client::models::{
    Chat, ChatCreate, ChatId, ChatUpdate, LoginRequest, Message, MessageCreate, MessageId,
    RegisterRequest, Role, SendMessageRequest, SendMessageResponse, TokenResponse, User, UserId,
};
use chat_client::services::{AuthService, ChatService};
use chat_client::session::SessionHandle;
use chat_client::storage::LocalStore;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const PASSWORD: &str = "correct-horse";

struct MockUser {
    user: User,
    password: String,
}

/// In-memory backend state
#[derive(Default)]
pub struct MockState {
    users: Vec<MockUser>,
    tokens: HashMap<String, UserId>,
    chats: Vec<Chat>,
    next_id: i64,
    /// One-shot injected failures by operation name
    failures: HashMap<&'static str, u16>,
    /// Artificial latency for message listing, by chat
    message_delays: HashMap<ChatId, Duration>,
    /// Artificial latency before a send is stored and answered, by chat
    send_delays: HashMap<ChatId, Duration>,
    /// Every request seen, as "METHOD /path"
    pub requests: Vec<String>,
    /// Authorization header of the last request
    pub last_authorization: Option<String>,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_failure(&mut self, op: &'static str) -> Option<HttpResponse> {
        self.failures.remove(op).map(|status| {
            let status = actix_web::http::StatusCode::from_u16(status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(json!({ "detail": "injected failure" }))
        })
    }

    fn new_message(&mut self, chat_id: ChatId, user_id: UserId, role: Role, content: &str) -> Message {
        Message {
            id: MessageId(self.next_id()),
            content: content.to_string(),
            role,
            chat_id,
            user_id,
            created_at: Utc::now(),
        }
    }

    fn owned_chat_mut(&mut self, chat_id: ChatId, user_id: UserId) -> Option<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|c| c.id == chat_id && c.user_id == user_id && c.is_active)
    }
}

type Backend = web::Data<Mutex<MockState>>;

fn lock(backend: &Backend) -> MutexGuard<'_, MockState> {
    backend.lock().unwrap_or_else(|p| p.into_inner())
}

/// Record the request, apply injected failures and resolve the bearer token
fn authorize(
    state: &mut MockState,
    req: &HttpRequest,
    op: &'static str,
) -> Result<UserId, HttpResponse> {
    state
        .requests
        .push(format!("{} {}", req.method(), req.path()));
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string());
    state.last_authorization = header.clone();

    if let Some(response) = state.take_failure(op) {
        return Err(response);
    }

    header
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.get(token).copied())
        .ok_or_else(|| {
            HttpResponse::Unauthorized().json(json!({ "detail": "Could not validate credentials" }))
        })
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "detail": "Chat not found" }))
}

async fn register(backend: Backend, req: HttpRequest, body: web::Json<RegisterRequest>) -> HttpResponse {
    let mut state = lock(&backend);
    state.requests.push(format!("{} {}", req.method(), req.path()));
    if let Some(response) = state.take_failure("register") {
        return response;
    }
    if state.users.iter().any(|u| u.user.username == body.username) {
        return HttpResponse::BadRequest().json(json!({ "detail": "Username already registered" }));
    }

    let user = User {
        id: UserId(state.next_id()),
        username: body.username.clone(),
        email: body.email.clone(),
        is_active: true,
        is_admin: false,
        created_at: Utc::now(),
        updated_at: None,
    };
    state.users.push(MockUser {
        user: user.clone(),
        password: body.password.clone(),
    });
    HttpResponse::Ok().json(user)
}

async fn login(backend: Backend, req: HttpRequest, body: web::Json<LoginRequest>) -> HttpResponse {
    let mut state = lock(&backend);
    state.requests.push(format!("{} {}", req.method(), req.path()));
    if let Some(response) = state.take_failure("login") {
        return response;
    }

    let user_id = state
        .users
        .iter()
        .find(|u| u.user.username == body.username && u.password == body.password)
        .map(|u| u.user.id);

    match user_id {
        Some(user_id) => {
            let token = format!("token-{}-{}", user_id, state.next_id());
            state.tokens.insert(token.clone(), user_id);
            HttpResponse::Ok().json(TokenResponse {
                access_token: token,
                token_type: "bearer".to_string(),
            })
        }
        None => HttpResponse::Unauthorized().json(json!({ "detail": "Incorrect username or password" })),
    }
}

async fn me(backend: Backend, req: HttpRequest) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "me") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.users.iter().find(|u| u.user.id == user_id) {
        Some(u) => HttpResponse::Ok().json(&u.user),
        None => HttpResponse::Unauthorized().finish(),
    }
}

async fn create_chat(backend: Backend, req: HttpRequest, body: web::Json<ChatCreate>) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "create_chat") {
        Ok(id) => id,
        Err(response) => return response,
    };
    let chat = Chat {
        id: ChatId(state.next_id()),
        title: body.title.clone(),
        user_id,
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
        messages: Vec::new(),
    };
    state.chats.push(chat.clone());
    HttpResponse::Ok().json(chat)
}

async fn list_chats(backend: Backend, req: HttpRequest) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "list_chats") {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut chats: Vec<Chat> = state
        .chats
        .iter()
        .filter(|c| c.user_id == user_id && c.is_active)
        .cloned()
        .collect();
    chats.sort_by(|a, b| b.id.0.cmp(&a.id.0));
    HttpResponse::Ok().json(chats)
}

async fn get_chat(backend: Backend, req: HttpRequest, path: web::Path<i64>) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "get_chat") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.owned_chat_mut(ChatId(*path), user_id) {
        Some(chat) => HttpResponse::Ok().json(chat.clone()),
        None => not_found(),
    }
}

async fn update_chat(
    backend: Backend,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ChatUpdate>,
) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "update_chat") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.owned_chat_mut(ChatId(*path), user_id) {
        Some(chat) => {
            if let Some(title) = &body.title {
                chat.title = title.clone();
            }
            if let Some(is_active) = body.is_active {
                chat.is_active = is_active;
            }
            chat.updated_at = Some(Utc::now());
            HttpResponse::Ok().json(chat.clone())
        }
        None => not_found(),
    }
}

async fn delete_chat(backend: Backend, req: HttpRequest, path: web::Path<i64>) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "delete_chat") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.owned_chat_mut(ChatId(*path), user_id) {
        Some(chat) => {
            chat.is_active = false;
            HttpResponse::Ok().json(json!({ "message": "Chat deleted successfully" }))
        }
        None => not_found(),
    }
}

async fn create_message(
    backend: Backend,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<MessageCreate>,
) -> HttpResponse {
    let mut state = lock(&backend);
    let user_id = match authorize(&mut state, &req, "create_message") {
        Ok(id) => id,
        Err(response) => return response,
    };
    let chat_id = ChatId(*path);
    if state.owned_chat_mut(chat_id, user_id).is_none() {
        return not_found();
    }
    let message = state.new_message(chat_id, user_id, body.role, &body.content);
    if let Some(chat) = state.owned_chat_mut(chat_id, user_id) {
        chat.messages.push(message.clone());
    }
    HttpResponse::Ok().json(message)
}

async fn list_messages(backend: Backend, req: HttpRequest, path: web::Path<i64>) -> HttpResponse {
    let chat_id = ChatId(*path);
    let delay = {
        let mut state = lock(&backend);
        if let Err(response) = authorize(&mut state, &req, "list_messages") {
            return response;
        }
        state.message_delays.get(&chat_id).copied()
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = lock(&backend);
    let user_id = match req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|t| state.tokens.get(t).copied())
    {
        Some(id) => id,
        None => return HttpResponse::Unauthorized().finish(),
    };
    match state.owned_chat_mut(chat_id, user_id) {
        Some(chat) => HttpResponse::Ok().json(chat.messages.clone()),
        None => not_found(),
    }
}

async fn send_message(
    backend: Backend,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<SendMessageRequest>,
) -> HttpResponse {
    let chat_id = ChatId(*path);
    let (user_id, delay) = {
        let mut state = lock(&backend);
        let user_id = match authorize(&mut state, &req, "send_message") {
            Ok(id) => id,
            Err(response) => return response,
        };
        if state.owned_chat_mut(chat_id, user_id).is_none() {
            return not_found();
        }
        (user_id, state.send_delays.get(&chat_id).copied())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = lock(&backend);
    let user_message = state.new_message(chat_id, user_id, Role::User, &body.content);
    let reply = format!("Echo: {}", body.content);
    let assistant_message = state.new_message(chat_id, user_id, Role::Assistant, &reply);
    if let Some(chat) = state.owned_chat_mut(chat_id, user_id) {
        chat.messages.push(user_message.clone());
        chat.messages.push(assistant_message.clone());
    }

    HttpResponse::Ok().json(SendMessageResponse {
        user_message,
        assistant_message,
    })
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/auth/register", web::post().to(register))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/me", web::get().to(me))
        .route("/api/chat/", web::post().to(create_chat))
        .route("/api/chat/", web::get().to(list_chats))
        .route("/api/chat/{id}", web::get().to(get_chat))
        .route("/api/chat/{id}", web::put().to(update_chat))
        .route("/api/chat/{id}", web::delete().to(delete_chat))
        .route("/api/chat/{id}/messages", web::post().to(create_message))
        .route("/api/chat/{id}/messages", web::get().to(list_messages))
        .route("/api/chat/{id}/send-message", web::post().to(send_message));
}

/// A running mock backend
pub struct MockBackend {
    pub base_url: String,
    state: Backend,
}

impl MockBackend {
    /// Bind to a random port on 127.0.0.1 and serve in the background
    pub async fn spawn() -> MockBackend {
        let state: Backend = web::Data::new(Mutex::new(MockState::default()));
        let app_state = state.clone();

        let server = HttpServer::new(move || App::new().app_data(app_state.clone()).configure(configure))
            .workers(1)
            .bind("127.0.0.1:0")
            .expect("Failed to bind mock backend");
        let addr = server.addrs()[0];
        tokio::spawn(server.run());

        // Give server a moment to bind
        tokio::time::sleep(Duration::from_millis(50)).await;

        MockBackend {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Add an account directly
    pub fn seed_user(&self, username: &str) -> UserId {
        let mut state = self.state();
        let user = User {
            id: UserId(state.next_id()),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            is_active: true,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        let id = user.id;
        state.users.push(MockUser {
            user,
            password: PASSWORD.to_string(),
        });
        id
    }

    /// Add a chat directly, optionally with messages alternating user/assistant
    pub fn seed_chat(&self, user_id: UserId, title: &str, messages: usize) -> ChatId {
        let mut state = self.state();
        let chat_id = ChatId(state.next_id());
        let mut chat = Chat {
            id: chat_id,
            title: title.to_string(),
            user_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
            messages: Vec::new(),
        };
        for i in 0..messages {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            let message = state.new_message(chat_id, user_id, role, &format!("seeded {}", i));
            chat.messages.push(message);
        }
        state.chats.push(chat);
        chat_id
    }

    /// Make the next call of `op` fail with `status`
    pub fn fail_next(&self, op: &'static str, status: u16) {
        self.state().failures.insert(op, status);
    }

    /// Slow down message listing for one chat
    pub fn delay_messages(&self, chat_id: ChatId, delay: Duration) {
        self.state().message_delays.insert(chat_id, delay);
    }

    /// Slow down sends in one chat
    pub fn delay_sends(&self, chat_id: ChatId, delay: Duration) {
        self.state().send_delays.insert(chat_id, delay);
    }

    /// Invalidate every issued token
    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    pub fn server_messages(&self, chat_id: ChatId) -> usize {
        self.state()
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .map(|c| c.messages.len())
            .unwrap_or(0)
    }
}

/// A fresh session over an in-memory store
pub fn new_session() -> SessionHandle {
    SessionHandle::new(LocalStore::in_memory().expect("Failed to open in-memory store"))
}

pub fn api_for(backend: &MockBackend, session: SessionHandle) -> Arc<ChatApi> {
    Arc::new(ChatApi::new(&backend.base_url, session).expect("Failed to create API client"))
}

/// Everything a test needs for one logged-in user
pub struct LoggedIn {
    pub user_id: UserId,
    pub session: SessionHandle,
    pub api: Arc<ChatApi>,
    pub auth: AuthService,
    pub chats: ChatService,
}

/// Seed `username` on the backend and log in through the auth store
pub async fn logged_in(backend: &MockBackend, username: &str) -> LoggedIn {
    let user_id = backend.seed_user(username);
    let session = new_session();
    let api = api_for(backend, session.clone());
    let auth = AuthService::new(api.clone());
    auth.login(username, PASSWORD)
        .await
        .expect("Login should succeed");
    let chats = ChatService::new(api.clone());

    LoggedIn {
        user_id,
        session,
        api,
        auth,
        chats,
    }
}
