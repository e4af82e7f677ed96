//! On-the-fly ZIP construction from a transfer's stored objects.
//!
//! Objects are fetched sequentially and appended to a streaming ZIP encoder
//! writing straight into the supplied sink. One object may be buffered in
//! full while it is encoded; the archive as a whole never is. A failed fetch
//! or append stops the stream immediately, leaving whatever bytes were
//! already flushed; a one-way pipe cannot take them back, so the consumer
//! sees a truncated archive (missing end-of-central-directory record).
//!
//! Cancellation rides the sink: when the downstream consumer goes away the
//! next write fails, which aborts the fetch loop within one iteration
//! instead of continuing to pull objects from storage.

use async_zip::error::ZipError;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use bytes::Bytes;
use futures::TryStreamExt;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tracing::debug;

use paquet_store::{ObjectEntry, ObjectStore, StoreError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("transfer has no archivable objects")]
    EmptyPackage,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("zip encoding failed: {0}")]
    Zip(#[from] ZipError),
}

/// Fetch every entry and append it, in order, to a ZIP stream written into
/// `sink`. Entry names are the keys relative to `namespace`.
///
/// An empty entry list fails with [`ArchiveError::EmptyPackage`] before any
/// byte is written, so callers can still send a clean error response.
pub async fn stream_archive<W>(
    store: &dyn ObjectStore,
    namespace: &str,
    entries: &[ObjectEntry],
    sink: W,
) -> Result<(), ArchiveError>
where
    W: AsyncWrite + Unpin,
{
    if entries.is_empty() {
        return Err(ArchiveError::EmptyPackage);
    }

    let mut writer = ZipFileWriter::with_tokio(sink);
    for entry in entries {
        let relative = entry.key.strip_prefix(namespace).unwrap_or(&entry.key);
        let chunks: Vec<Bytes> = store.get(&entry.key).await?.try_collect().await?;
        let body = chunks.concat();
        debug!(key = %entry.key, size = body.len(), "appending archive entry");

        let builder = ZipEntryBuilder::new(relative.to_owned().into(), Compression::Deflate);
        writer.write_entry_whole(builder, &body).await?;
    }
    writer.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use rand::RngCore;
    use tokio::io::AsyncReadExt;

    use super::{stream_archive, ArchiveError};
    use paquet_store::{
        ByteStream, ListPage, MemoryObjectStore, ObjectEntry, ObjectStore, StoreError,
    };

    const NS: &str = "transfers/AB3XQ9/";

    fn entry(relative: &str, size: u64) -> ObjectEntry {
        ObjectEntry {
            key: format!("{NS}{relative}"),
            size,
        }
    }

    async fn collect_archive(
        store: &dyn ObjectStore,
        entries: &[ObjectEntry],
    ) -> Result<Vec<u8>, ArchiveError> {
        let (mut reader, writer) = tokio::io::duplex(1024 * 1024);
        let result = stream_archive(store, NS, entries, writer).await;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        result.map(|()| out)
    }

    #[tokio::test]
    async fn produces_a_readable_zip_in_lister_order() {
        let store = MemoryObjectStore::new();
        store
            .put(&format!("{NS}notes.txt"), Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();
        store
            .put(&format!("{NS}docs/a.md"), Bytes::from_static(b"# a"), "text/markdown")
            .await
            .unwrap();

        let entries = [entry("docs/a.md", 3), entry("notes.txt", 5)];
        let bytes = collect_archive(&store, &entries).await.unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["docs/a.md", "notes.txt"]);

        let mut content = String::new();
        archive
            .by_name("notes.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn empty_entry_list_fails_before_any_output() {
        let store = MemoryObjectStore::new();
        let (mut reader, writer) = tokio::io::duplex(4096);
        let result = stream_archive(&store, NS, &[], writer).await;
        assert!(matches!(result, Err(ArchiveError::EmptyPackage)));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_object_stops_the_stream() {
        let store = MemoryObjectStore::new();
        store
            .put(&format!("{NS}notes.txt"), Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let entries = [entry("notes.txt", 5), entry("vanished.bin", 10)];
        let result = collect_archive(&store, &entries).await;
        assert!(matches!(result, Err(ArchiveError::Store(_))));
    }

    /// Delegating store that counts fetches, to pin down how far the loop
    /// runs after the consumer disconnects.
    struct CountingStore {
        inner: MemoryObjectStore,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
            self.inner.put(key, body, content_type).await
        }

        async fn get(&self, key: &str) -> Result<ByteStream, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StoreError> {
            self.inner.list(prefix, cursor).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn consumer_disconnect_halts_the_fetch_loop() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryObjectStore::new(),
            fetches: fetches.clone(),
        };

        // Incompressible bodies so the deflate output dwarfs the pipe
        // capacity and the writer has to block on the consumer.
        let mut rng = rand::thread_rng();
        let mut entries = Vec::new();
        for name in ["a.bin", "b.bin", "c.bin", "d.bin"] {
            let mut body = vec![0u8; 256 * 1024];
            rng.fill_bytes(&mut body);
            store
                .put(&format!("{NS}{name}"), Bytes::from(body), "application/octet-stream")
                .await
                .unwrap();
            entries.push(entry(name, 256 * 1024));
        }

        let (mut reader, writer) = tokio::io::duplex(8 * 1024);
        let task = tokio::spawn(async move { stream_archive(&store, NS, &entries, writer).await });

        let mut first = vec![0u8; 4096];
        reader.read_exact(&mut first).await.unwrap();
        drop(reader);

        let result = task.await.unwrap();
        assert!(result.is_err());
        // The disconnect must be observed within one fetch iteration.
        assert!(
            fetches.load(Ordering::SeqCst) <= 2,
            "fetch loop kept running after disconnect: {} fetches",
            fetches.load(Ordering::SeqCst)
        );
    }
}
