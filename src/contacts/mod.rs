pub mod model;
pub mod service;

pub use model::{ConnectionRequest, Contact, UserProfile};
pub use service::{ensure_profile, profile_username, ConnectionsService};
