//! In-memory session store
//!
//! The default backing store: a map behind an async `RwLock` with lazy
//! TTL eviction. Sessions for different identifiers never contend
//! beyond the brief map lock.

use std::collections::HashMap;

use axum::async_trait;
use tokio::sync::RwLock;

use super::{SessionId, SessionRecord, SessionStore};
use crate::error::AppError;

/// In-memory `SessionStore` implementation
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired but unevicted) records
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, AppError> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(id.as_str()) {
                Some(record) if record.is_expired() => true,
                Some(record) => return Ok(Some(record.clone())),
                None => return Ok(None),
            }
        };

        // Evict lazily so an expired session cannot be resurrected.
        if expired {
            self.entries.write().await.remove(id.as_str());
        }
        Ok(None)
    }

    async fn save(&self, id: &SessionId, record: SessionRecord) -> Result<(), AppError> {
        self.entries
            .write()
            .await
            .insert(id.as_str().to_string(), record);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), AppError> {
        self.entries.write().await.remove(id.as_str());
        Ok(())
    }
}
