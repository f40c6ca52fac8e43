/// Chat Client Library
/// Session handling, chat synchronization and a typed REST client for the chat service

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod router;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;

pub use api::ChatApi;
pub use client::ChatClient;
pub use error::{ClientError, Result};
pub use session::SessionHandle;
pub use state::ChatState;
