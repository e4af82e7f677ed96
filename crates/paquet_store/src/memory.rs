//! In-process [`ObjectStore`] backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::{ByteStream, ListPage, ObjectEntry, ObjectStore, StoreError};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// BTreeMap-backed store. Listing order is lexicographic by key and the
/// page size is configurable so pagination paths are exercised in tests.
/// Content types are accepted at `put` for trait parity with real backends
/// but not retained; `get` hands back bytes only.
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
    page_size: usize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: page_size.max(1),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ByteStream, StoreError> {
        let objects = self.objects.read().await;
        let body = objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(futures::stream::once(async move { Ok(body) }).boxed())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StoreError> {
        let objects = self.objects.read().await;
        let mut entries = Vec::with_capacity(self.page_size);
        let mut next_cursor = None;

        for (key, body) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if cursor.is_some_and(|cursor| key.as_str() <= cursor) {
                continue;
            }
            if entries.len() == self.page_size {
                next_cursor = entries.last().map(|entry: &ObjectEntry| entry.key.clone());
                break;
            }
            entries.push(ObjectEntry {
                key: key.clone(),
                size: body.len() as u64,
            });
        }

        Ok(ListPage {
            entries,
            next_cursor,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }
}
