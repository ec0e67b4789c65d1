use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::{PeerChatError, Result};
use crate::network::sanitize_username;

/// The signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub uid: String,
    pub email: String,
}

impl CurrentUser {
    /// Local part of the email, used as the default username
    pub fn email_username(&self) -> String {
        self.email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Username for a new profile: the email's local part reduced to the
    /// characters a peer identifier may use, else derived from the uid
    pub fn default_username(&self) -> String {
        sanitize_username(&self.email_username())
            .unwrap_or_else(|| format!("user-{}", self.uid.chars().take(8).collect::<String>()))
    }
}

/// Sign-in state as seen by the controllers
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Result<Option<CurrentUser>>;
    fn sign_out(&self) -> Result<()>;

    /// Current user, or `NotSignedIn`
    fn require_user(&self) -> Result<CurrentUser> {
        self.current_user()?.ok_or(PeerChatError::NotSignedIn)
    }
}

/// Session kept in a JSON file inside the data directory
pub struct LocalAuth {
    session_path: PathBuf,
}

impl LocalAuth {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            session_path: data_dir.join("session.json"),
        }
    }

    /// Sign in with an email; the uid is stable for a given address
    pub fn sign_in(&self, email: &str) -> Result<CurrentUser> {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') || email.starts_with('@') {
            return Err(PeerChatError::InvalidEmail(email));
        }

        let uid = Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes())
            .simple()
            .to_string();
        let user = CurrentUser { uid, email };

        if let Some(parent) = self.session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.session_path, serde_json::to_string_pretty(&user)?)?;
        info!("Signed in as {}", user.email);
        Ok(user)
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Result<Option<CurrentUser>> {
        match std::fs::read_to_string(&self.session_path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn sign_out(&self) -> Result<()> {
        match std::fs::remove_file(&self.session_path) {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
