use thiserror::Error;

/// Errors produced by the chat library.
///
/// Workflow variants carry the exact text shown to the user, so controllers
/// can surface them with `to_string()`.
#[derive(Error, Debug)]
pub enum PeerChatError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("This user is already in your contacts")]
    AlreadyContact,

    #[error("Connection request already sent to this user")]
    AlreadyRequested,

    #[error("You cannot add yourself as a contact")]
    SelfRequest,

    #[error("User not found. Check the Peer ID and try again.")]
    UserNotFound,

    #[error("No pending connection request from {0}")]
    RequestNotFound(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("No active connection")]
    NotConnected,

    #[error("Invalid database path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("File transfer error: {0}")]
    Transfer(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Node has shut down")]
    NodeClosed,
}

pub type Result<T> = std::result::Result<T, PeerChatError>;
