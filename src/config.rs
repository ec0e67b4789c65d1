use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PeerChatError, Result};
use crate::file_transfer::{SendOptions, CHUNK_SIZE};
use crate::network::NetworkConfig;

/// Largest chunk that still fits a frame once base64-encoded
pub const MAX_CHUNK_SIZE: usize = 512 * 1024;

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_directory: String,
    pub download_directory: String,
    pub chunk_size: usize,
    pub network: NetworkConfig,
    pub timing: TimingConfig,
}

/// Timers of the chat page, in milliseconds unless named otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub liveness_interval_secs: u64,
    pub retry_delay_secs: u64,
    pub ping_failure_retry_ms: u64,
    pub connect_timeout_secs: u64,
    pub typing_idle_ms: u64,
    pub transfer_start_delay_ms: u64,
    pub chunk_interval_ms: u64,
    pub completion_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            liveness_interval_secs: 15,
            retry_delay_secs: 5,
            ping_failure_retry_ms: 1000,
            connect_timeout_secs: 15,
            typing_idle_ms: 2000,
            transfer_start_delay_ms: 500,
            chunk_interval_ms: 10,
            completion_delay_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn ping_failure_retry(&self) -> Duration {
        Duration::from_millis(self.ping_failure_retry_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_dir = format!("{}/.peerchat", home);

        Self {
            data_directory: data_dir.clone(),
            download_directory: format!("{}/downloads", data_dir),
            chunk_size: CHUNK_SIZE,
            network: NetworkConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Configuration rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            data_directory: data_dir.display().to_string(),
            download_directory: data_dir.join("downloads").display().to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from file, or defaults when no file is given or it does not exist
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn data_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.data_directory)
    }

    pub fn download_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.download_directory)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir_path().join("db")
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.data_dir_path().join("logs")
    }

    /// Ensure all directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_directory)?;
        std::fs::create_dir_all(&self.download_directory)?;
        Ok(())
    }

    /// Pacing for outgoing files
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            chunk_size: self.chunk_size,
            start_delay: Duration::from_millis(self.timing.transfer_start_delay_ms),
            chunk_interval: Duration::from_millis(self.timing.chunk_interval_ms),
            completion_delay: Duration::from_millis(self.timing.completion_delay_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PeerChatError::Config("Chunk size must be greater than 0".to_string()));
        }

        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PeerChatError::Config(format!(
                "Chunk size must be at most {} bytes",
                MAX_CHUNK_SIZE
            )));
        }

        if self.data_directory.trim().is_empty() {
            return Err(PeerChatError::Config("Data directory must be set".to_string()));
        }

        let timing = &self.timing;
        if timing.liveness_interval_secs == 0
            || timing.retry_delay_secs == 0
            || timing.ping_failure_retry_ms == 0
            || timing.connect_timeout_secs == 0
            || timing.typing_idle_ms == 0
        {
            return Err(PeerChatError::Config("Timer intervals must be greater than 0".to_string()));
        }

        let invalid = self.network.invalid_addresses();
        if !invalid.is_empty() {
            return Err(PeerChatError::Config(format!(
                "Invalid peer addresses: {}",
                invalid.join(", ")
            )));
        }

        Ok(())
    }
}
