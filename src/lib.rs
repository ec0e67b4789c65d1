pub mod application;
pub mod auth;
pub mod chat;
pub mod config;
pub mod contacts;
pub mod database;
pub mod error;
pub mod file_transfer;
pub mod logging;
pub mod network;
pub mod notice;
pub mod protocol;
pub mod utils;

// Re-export for easy access in tests
pub use config::AppConfig;
pub use error::{PeerChatError, Result};
