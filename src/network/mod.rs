pub mod behaviour;
pub mod config;
pub mod handle;
pub mod identity;
pub mod node;

pub use config::NetworkConfig;
pub use handle::{NodeHandle, PeerLink, SendTicket};
pub use identity::{peer_id_for, sanitize_username, validate_username};
pub use node::{ChatNode, NodeEvent};
