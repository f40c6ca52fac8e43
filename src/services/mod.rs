/// Service layer for the chat client.
/// Session and chat stores built on top of the API client.

pub mod auth_service;
pub mod chat_service;

pub use auth_service::AuthService;
pub use chat_service::ChatService;
