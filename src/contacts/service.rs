use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::model::{ConnectionRequest, Contact, UserProfile};
use crate::auth::CurrentUser;
use crate::database::{contacts_path, requests_path, user_path, Database, USERS_ROOT};
use crate::error::{PeerChatError, Result};
use crate::network::validate_username;

/// Contact and connection-request workflow for the signed-in user
pub struct ConnectionsService {
    db: Arc<dyn Database>,
    user: CurrentUser,
    username: String,
}

impl ConnectionsService {
    /// Load (or create) the user's profile.
    ///
    /// When the profile cannot be read the email's local part is used as the
    /// username for this session.
    pub async fn open(db: Arc<dyn Database>, user: CurrentUser) -> Self {
        let username = match ensure_profile(db.as_ref(), &user).await {
            Ok(profile) => profile.username,
            Err(e) => {
                warn!("Error getting user data: {}", e);
                user.default_username()
            }
        };
        Self { db, user, username }
    }

    /// Our own peer identifier
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        records(self.db.as_ref(), &contacts_path(&self.user.uid)).await
    }

    pub async fn requests(&self) -> Result<Vec<ConnectionRequest>> {
        records(self.db.as_ref(), &requests_path(&self.user.uid)).await
    }

    pub async fn is_contact(&self, peer_id: &str) -> Result<bool> {
        Ok(self.contacts().await?.iter().any(|c| c.peer_id == peer_id))
    }

    pub async fn has_request(&self, peer_id: &str) -> Result<bool> {
        Ok(self.requests().await?.iter().any(|r| r.peer_id == peer_id))
    }

    /// Store a request unless one from the same peer is already pending
    pub async fn add_connection_request(&self, peer_id: &str, username: &str) -> Result<Option<ConnectionRequest>> {
        if self.has_request(peer_id).await? {
            return Ok(None);
        }

        let request = ConnectionRequest::new(peer_id, username);
        push_record(self.db.as_ref(), &requests_path(&self.user.uid), &request).await?;
        info!("New connection request from {}", request.display_name());
        Ok(Some(request))
    }

    /// An unsolicited peer connected to us.
    ///
    /// Known contacts and peers with a pending request are ignored; anyone
    /// else becomes a request named after their peer id.
    pub async fn record_incoming(&self, peer_id: &str) -> Result<Option<ConnectionRequest>> {
        if peer_id == self.username || self.is_contact(peer_id).await? {
            return Ok(None);
        }
        self.add_connection_request(peer_id, peer_id).await
    }

    /// Invite `peer_id` by writing into that user's pending requests
    pub async fn send_request(&self, peer_id: &str) -> Result<()> {
        let peer_id = peer_id.trim();
        if self.is_contact(peer_id).await? {
            return Err(PeerChatError::AlreadyContact);
        }
        if self.has_request(peer_id).await? {
            return Err(PeerChatError::AlreadyRequested);
        }
        if peer_id == self.username {
            return Err(PeerChatError::SelfRequest);
        }

        let other_uid = self.find_user_id(peer_id).await?.ok_or(PeerChatError::UserNotFound)?;
        let their_requests = requests_path(&other_uid);
        let pending: Vec<ConnectionRequest> = records(self.db.as_ref(), &their_requests).await?;
        if pending.iter().any(|r| r.peer_id == self.username) {
            return Err(PeerChatError::AlreadyRequested);
        }

        let request = ConnectionRequest::new(&self.username, &self.username);
        push_record(self.db.as_ref(), &their_requests, &request).await?;
        info!("Connection request sent to {}", peer_id);
        Ok(())
    }

    /// Turn a pending request into a contact on both sides
    pub async fn accept(&self, peer_id: &str) -> Result<Contact> {
        let request = self.pending_request(peer_id).await?;

        let contacts = self.contacts().await?;
        let contact = match contacts.into_iter().find(|c| c.peer_id == peer_id) {
            Some(existing) => existing,
            None => {
                let contact = Contact::new(&request.peer_id, &request.username);
                push_record(self.db.as_ref(), &contacts_path(&self.user.uid), &contact).await?;
                contact
            }
        };

        if let Some(other_uid) = self.find_user_id(peer_id).await? {
            let their_contacts = contacts_path(&other_uid);
            let existing: Vec<Contact> = records(self.db.as_ref(), &their_contacts).await?;
            if !existing.iter().any(|c| c.peer_id == self.username) {
                let reciprocal = Contact::new(&self.username, &self.username);
                push_record(self.db.as_ref(), &their_contacts, &reciprocal).await?;
            }
        }

        self.remove_requests_from(peer_id).await?;
        info!("Connection request from {} accepted", request.display_name());
        Ok(contact)
    }

    pub async fn reject(&self, peer_id: &str) -> Result<ConnectionRequest> {
        let request = self.pending_request(peer_id).await?;
        self.remove_requests_from(peer_id).await?;
        info!("Connection request from {} rejected", request.display_name());
        Ok(request)
    }

    /// Delete every contact record for `peer_id`; returns how many were removed
    pub async fn remove_contact(&self, peer_id: &str) -> Result<usize> {
        remove_matching::<Contact>(self.db.as_ref(), &contacts_path(&self.user.uid), |c| c.peer_id == peer_id).await
    }

    /// User id whose profile username equals `peer_id`
    pub async fn find_user_id(&self, peer_id: &str) -> Result<Option<String>> {
        for (uid, value) in self.db.children(USERS_ROOT).await? {
            if let Ok(profile) = serde_json::from_value::<UserProfile>(value) {
                if profile.username == peer_id {
                    return Ok(Some(uid));
                }
            }
        }
        Ok(None)
    }

    async fn pending_request(&self, peer_id: &str) -> Result<ConnectionRequest> {
        self.requests()
            .await?
            .into_iter()
            .find(|r| r.peer_id == peer_id)
            .ok_or_else(|| PeerChatError::RequestNotFound(peer_id.to_string()))
    }

    async fn remove_requests_from(&self, peer_id: &str) -> Result<usize> {
        remove_matching::<ConnectionRequest>(self.db.as_ref(), &requests_path(&self.user.uid), |r| {
            r.peer_id == peer_id
        })
        .await
    }
}

/// Profile for `user`, created from the email when missing.
///
/// A stored username that cannot serve as a peer identifier is replaced.
pub async fn ensure_profile(db: &dyn Database, user: &CurrentUser) -> Result<UserProfile> {
    let path = user_path(&user.uid);
    if let Some(value) = db.get(&path).await? {
        if let Ok(profile) = serde_json::from_value::<UserProfile>(value) {
            match validate_username(&profile.username) {
                Ok(()) => return Ok(profile),
                Err(e) => warn!("Replacing stored profile username: {}", e),
            }
        }
    }

    let profile = UserProfile {
        username: user.default_username(),
        email: Some(user.email.clone()),
    };
    db.set(&path, serde_json::to_value(&profile)?).await?;
    info!("Created profile {} for {}", profile.username, user.email);
    Ok(profile)
}

/// Username stored in the profile, without creating one
pub async fn profile_username(db: &dyn Database, uid: &str) -> Result<Option<String>> {
    Ok(db
        .get(&user_path(uid))
        .await?
        .and_then(|value| serde_json::from_value::<UserProfile>(value).ok())
        .map(|profile| profile.username)
        .filter(|username| !username.is_empty()))
}

async fn records<T: DeserializeOwned>(db: &dyn Database, parent: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (key, value) in db.children(parent).await? {
        match serde_json::from_value(value) {
            Ok(record) => out.push(record),
            Err(e) => warn!("Skipping malformed record {}/{}: {}", parent, key, e),
        }
    }
    Ok(out)
}

async fn push_record<T: Serialize>(db: &dyn Database, parent: &str, record: &T) -> Result<String> {
    db.push(parent, serde_json::to_value(record)?).await
}

async fn remove_matching<T: DeserializeOwned>(
    db: &dyn Database,
    parent: &str,
    matches: impl Fn(&T) -> bool,
) -> Result<usize> {
    let mut removed = 0;
    for (key, value) in db.children(parent).await? {
        if serde_json::from_value::<T>(value).is_ok_and(|record| matches(&record)) {
            db.remove(&format!("{}/{}", parent, key)).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
