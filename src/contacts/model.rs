use serde::{Deserialize, Serialize};

use crate::utils;

/// An accepted contact, stored at `contacts/{uid}/{pushId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub peer_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub timestamp: u64,
}

/// A pending invitation, stored at `requests/{uid}/{pushId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub peer_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub timestamp: u64,
}

/// Profile record at `users/{uid}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Contact {
    pub fn new(peer_id: &str, username: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            username: username.to_string(),
            timestamp: utils::now_millis(),
        }
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.username, &self.peer_id)
    }
}

impl ConnectionRequest {
    pub fn new(peer_id: &str, username: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            username: username.to_string(),
            timestamp: utils::now_millis(),
        }
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.username, &self.peer_id)
    }
}

fn display_name<'a>(username: &'a str, peer_id: &'a str) -> &'a str {
    if username.is_empty() { peer_id } else { username }
}
