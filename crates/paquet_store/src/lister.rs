//! Paginated enumeration of a transfer's archivable objects.

use futures::stream::{Stream, TryStreamExt};

use crate::{ObjectEntry, ObjectStore, StoreError};

/// Reserved suffix of the per-transfer metadata object. Keys carrying it are
/// control records and never appear in listings or archives.
pub const META_OBJECT_SUFFIX: &str = ".meta.json";

/// Lazily enumerate every archivable object under `namespace`, following
/// continuation cursors until the backend listing is exhausted.
///
/// Excluded: the metadata object, the bare namespace key (directory marker)
/// and any key ending in `/` (empty-folder marker). Order is whatever the
/// backend returns; calling again restarts a fresh pass.
pub fn list_transfer_objects<'a>(
    store: &'a dyn ObjectStore,
    namespace: &'a str,
) -> impl Stream<Item = Result<ObjectEntry, StoreError>> + Send + 'a {
    futures::stream::try_unfold(Some(None::<String>), move |state| async move {
        let Some(cursor) = state else {
            return Ok(None);
        };
        let page = store.list(namespace, cursor.as_deref()).await?;
        let next_state = page.next_cursor.map(Some);
        let entries: Vec<ObjectEntry> = page
            .entries
            .into_iter()
            .filter(|entry| is_archivable(&entry.key, namespace))
            .collect();
        Ok(Some((entries, next_state)))
    })
    .map_ok(|entries| futures::stream::iter(entries.into_iter().map(Ok::<_, StoreError>)))
    .try_flatten()
}

fn is_archivable(key: &str, namespace: &str) -> bool {
    key != namespace && !key.ends_with('/') && !key.ends_with(META_OBJECT_SUFFIX)
}
