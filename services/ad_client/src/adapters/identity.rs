//! services/ad_client/src/adapters/identity.rs
//!
//! This module contains the identity store adapters, which implement the
//! `IdentityStore` port from the `core` crate.

use ad_delivery_core::ports::{IdentityStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// File-backed Store
//=========================================================================================

/// A stored identifier and when it was first issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    value: String,
    created_at: DateTime<Utc>,
}

/// Persists identifiers as a JSON map in a single file.
pub struct FileIdentityStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileIdentityStore {
    /// Creates a new `FileIdentityStore`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> PortResult<HashMap<String, IdentityRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::Unexpected(format!(
                    "corrupt identity file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn get_or_create(&self, key: &str) -> PortResult<String> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        if let Some(record) = records.get(key) {
            return Ok(record.value.clone());
        }

        let value = Uuid::new_v4().to_string();
        records.insert(
            key.to_string(),
            IdentityRecord {
                value: value.clone(),
                created_at: Utc::now(),
            },
        );
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!("Issued new anonymous identifier for '{}'.", key);
        Ok(value)
    }
}

//=========================================================================================
// In-memory Store
//=========================================================================================

/// Keeps identifiers for the lifetime of the process.
#[derive(Default)]
pub struct MemoryIdentityStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_or_create(&self, key: &str) -> PortResult<String> {
        let mut values = self.values.lock().await;
        Ok(values
            .entry(key.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone())
    }
}
