//! Key-value database seam.
//!
//! Records live at slash-separated paths (`contacts/{uid}/{pushId}`), the way
//! a hosted realtime database lays them out. Every implementation lists
//! children in key order, which is also creation order for push ids.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PeerChatError, Result};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryDatabase;
pub use sled_store::SledDatabase;

#[async_trait]
pub trait Database: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>>;
    async fn set(&self, path: &str, value: Value) -> Result<()>;
    /// Store `value` under a new push id below `parent` and return the id
    async fn push(&self, parent: &str, value: Value) -> Result<String>;
    /// Remove a node together with everything below it
    async fn remove(&self, path: &str) -> Result<()>;
    /// Direct children of `parent` as `(key, value)`, ordered by key
    async fn children(&self, parent: &str) -> Result<Vec<(String, Value)>>;
}

pub fn user_path(uid: &str) -> String {
    format!("users/{}", uid)
}

pub fn contacts_path(uid: &str) -> String {
    format!("contacts/{}", uid)
}

pub fn requests_path(uid: &str) -> String {
    format!("requests/{}", uid)
}

pub const USERS_ROOT: &str = "users";

/// Trim surrounding slashes and reject empty segments
pub(crate) fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment.is_empty()) {
        return Err(PeerChatError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Key of a direct child of `parent_prefix` (which ends in '/'), if `key` is one
pub(crate) fn direct_child<'a>(parent_prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(parent_prefix)?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/users/abc/").unwrap(), "users/abc");
        assert!(normalize("").is_err());
        assert!(normalize("users//abc").is_err());
    }

    #[test]
    fn test_direct_child() {
        assert_eq!(direct_child("contacts/u1/", "contacts/u1/k1"), Some("k1"));
        assert_eq!(direct_child("contacts/u1/", "contacts/u1/k1/deep"), None);
        assert_eq!(direct_child("contacts/u1/", "contacts/u10/k1"), None);
    }
}
