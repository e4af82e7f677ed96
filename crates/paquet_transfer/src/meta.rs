//! The per-transfer metadata control object.
//!
//! Written once when a transfer is created and never updated in place; the
//! object store owns the only authoritative copy, so metadata survives
//! restarts and stays consistent across horizontally scaled relays.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use paquet_store::{ObjectStore, StoreError};

use crate::keys::meta_key;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("metadata object is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferMeta {
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub require_paid: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TransferMeta {
    pub fn new(pin: Option<String>, require_paid: bool, ttl_secs: Option<u64>) -> Self {
        let created_at = Utc::now();
        let expires_at = ttl_secs
            .filter(|secs| *secs > 0)
            .map(|secs| created_at + Duration::seconds(secs as i64));
        Self {
            pin: pin.filter(|pin| !pin.is_empty()),
            require_paid,
            created_at,
            expires_at,
        }
    }

    /// Unknown transfers behave like an open one: no PIN, no paywall.
    pub fn open() -> Self {
        Self::new(None, false, None)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

pub async fn save_meta(
    store: &dyn ObjectStore,
    id: &str,
    meta: &TransferMeta,
) -> Result<(), MetaError> {
    let body = serde_json::to_vec(meta).map_err(MetaError::Decode)?;
    store
        .put(&meta_key(id), Bytes::from(body), "application/json")
        .await?;
    Ok(())
}

/// Load a transfer's metadata; `Ok(None)` when no record exists.
pub async fn load_meta(store: &dyn ObjectStore, id: &str) -> Result<Option<TransferMeta>, MetaError> {
    let stream = match store.get(&meta_key(id)).await {
        Ok(stream) => stream,
        Err(StoreError::NotFound(_)) => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let chunks: Vec<Bytes> = stream.try_collect().await?;
    let meta = serde_json::from_slice(&chunks.concat()).map_err(MetaError::Decode)?;
    Ok(Some(meta))
}

#[cfg(test)]
mod tests {
    use super::{load_meta, save_meta, TransferMeta};
    use chrono::{Duration, Utc};
    use paquet_store::MemoryObjectStore;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryObjectStore::new();
        let meta = TransferMeta::new(Some("1234".to_string()), true, Some(3600));
        save_meta(&store, "AB3XQ9", &meta).await.unwrap();

        let loaded = load_meta(&store, "AB3XQ9").await.unwrap().unwrap();
        assert_eq!(loaded, meta);
    }

    #[tokio::test]
    async fn missing_metadata_is_none() {
        let store = MemoryObjectStore::new();
        assert!(load_meta(&store, "AB3XQ9").await.unwrap().is_none());
    }

    #[test]
    fn empty_pin_is_treated_as_unset() {
        let meta = TransferMeta::new(Some(String::new()), false, None);
        assert!(meta.pin.is_none());
    }

    #[test]
    fn expiry_window() {
        let meta = TransferMeta::new(None, false, Some(60));
        assert!(!meta.is_expired(Utc::now()));
        assert!(meta.is_expired(Utc::now() + Duration::seconds(120)));

        let open = TransferMeta::new(None, false, None);
        assert!(!open.is_expired(Utc::now() + Duration::days(365)));
    }
}
