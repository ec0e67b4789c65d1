pub mod chat;
pub mod connections;
pub mod view;

pub use chat::{ChatPage, ChatTarget};
pub use connections::{knock, ConnectionsPage};
