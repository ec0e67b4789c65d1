//! Username-derived libp2p identities.
//!
//! A username is the address other users type in, so the keypair is a pure
//! function of it: everyone can compute the `PeerId` a username dials to.
//! identify announces the username as `peerchat/{username}`, and the
//! announcement is only trusted when it derives the PeerId it came from.

use libp2p::{identity, PeerId};
use sha2::{Digest, Sha256};

use crate::error::{PeerChatError, Result};

pub const AGENT_PREFIX: &str = "peerchat/";
const SEED_DOMAIN: &[u8] = b"peerchat-identity-v1:";
pub const MAX_USERNAME_LEN: usize = 64;

pub fn validate_username(username: &str) -> Result<()> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));
    if valid {
        Ok(())
    } else {
        Err(PeerChatError::InvalidUsername(username.to_string()))
    }
}

/// Strip everything `validate_username` refuses; `None` when nothing is left
pub fn sanitize_username(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
        .take(MAX_USERNAME_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn keypair_for(username: &str) -> Result<identity::Keypair> {
    validate_username(username)?;
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(username.as_bytes());
    let seed: [u8; 32] = hasher.finalize().into();

    identity::Keypair::ed25519_from_bytes(seed)
        .map_err(|e| PeerChatError::Network(format!("Failed to derive keypair: {}", e)))
}

pub fn peer_id_for(username: &str) -> Result<PeerId> {
    Ok(keypair_for(username)?.public().to_peer_id())
}

pub fn agent_version(username: &str) -> String {
    format!("{}{}", AGENT_PREFIX, username)
}

pub fn username_from_agent(agent: &str) -> Option<&str> {
    agent.strip_prefix(AGENT_PREFIX).filter(|name| !name.is_empty())
}

/// Username announced by `peer`, if it matches the peer's identity
pub fn verify_agent(peer: &PeerId, agent: &str) -> Option<String> {
    let username = username_from_agent(agent)?;
    match peer_id_for(username) {
        Ok(expected) if expected == *peer => Some(username.to_string()),
        _ => None,
    }
}
