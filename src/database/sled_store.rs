use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::{direct_child, normalize, Database};
use crate::error::Result;
use crate::utils;

/// Embedded on-disk database backed by sled
#[derive(Clone)]
pub struct SledDatabase {
    db: sled::Db,
}

impl SledDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("Opening database at {}", path.as_ref().display());
        Ok(Self { db: sled::open(path)? })
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for SledDatabase {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let key = normalize(path)?;
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let key = normalize(path)?;
        self.db.insert(key.as_bytes(), serde_json::to_vec(&value)?)?;
        self.flush().await
    }

    async fn push(&self, parent: &str, value: Value) -> Result<String> {
        let parent = normalize(parent)?;
        let id = utils::push_id();
        let key = format!("{}/{}", parent, id);
        self.db.insert(key.as_bytes(), serde_json::to_vec(&value)?)?;
        self.flush().await?;
        Ok(id)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let key = normalize(path)?;
        self.db.remove(key.as_bytes())?;

        let prefix = format!("{}/", key);
        let nested: Vec<sled::IVec> = self
            .db
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<std::result::Result<_, _>>()?;
        for nested_key in nested {
            self.db.remove(nested_key)?;
        }
        self.flush().await
    }

    async fn children(&self, parent: &str) -> Result<Vec<(String, Value)>> {
        let prefix = format!("{}/", normalize(parent)?);
        let mut children = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let key = String::from_utf8_lossy(&key);
            if let Some(child) = direct_child(&prefix, &key) {
                children.push((child.to_string(), serde_json::from_slice(&value)?));
            }
        }
        Ok(children)
    }
}
