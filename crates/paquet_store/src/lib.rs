//! The object-store capability the relay is built against.
//!
//! Everything durable (uploaded objects and the per-transfer metadata
//! object) lives behind [`ObjectStore`]. The relay only requires paginated
//! listing and streamable bodies; which S3-compatible backend provides that
//! is a deployment concern outside this workspace. [`MemoryObjectStore`]
//! is the in-process implementation used by tests and single-node setups.

pub mod lister;
pub mod memory;

pub use lister::{list_transfer_objects, META_OBJECT_SUFFIX};
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Streamed object body.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// One listed object: key plus byte size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// One page of a listing, with the cursor to resume from if more remain.
#[derive(Debug, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_cursor: Option<String>,
}

/// Minimal get/put/list/delete capability over S3-compatible blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Retrieve an object body as a byte stream.
    async fn get(&self, key: &str) -> Result<ByteStream, StoreError>;

    /// List keys under `prefix`, one page at a time. A `next_cursor` in the
    /// returned page means the listing is not exhausted.
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
