use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{direct_child, normalize, Database};
use crate::error::Result;
use crate::utils;

/// In-memory database for tests and throwaway sessions
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    nodes: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let key = normalize(path)?;
        Ok(self.nodes.read().await.get(&key).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let key = normalize(path)?;
        self.nodes.write().await.insert(key, value);
        Ok(())
    }

    async fn push(&self, parent: &str, value: Value) -> Result<String> {
        let parent = normalize(parent)?;
        let id = utils::push_id();
        self.nodes.write().await.insert(format!("{}/{}", parent, id), value);
        Ok(id)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let key = normalize(path)?;
        let prefix = format!("{}/", key);
        let mut nodes = self.nodes.write().await;
        nodes.remove(&key);
        nodes.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    async fn children(&self, parent: &str) -> Result<Vec<(String, Value)>> {
        let prefix = format!("{}/", normalize(parent)?);
        let nodes = self.nodes.read().await;
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, v)| direct_child(&prefix, k).map(|child| (child.to_string(), v.clone())))
            .collect())
    }
}
