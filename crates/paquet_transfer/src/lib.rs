//! Transfer domain model: ids, storage keys, the metadata record and the
//! download access gate.

pub mod access;
pub mod keys;
pub mod meta;

pub use access::{authorize_download, AccessDecision, DownloadCredentials, PaymentPolicy};
pub use keys::{
    generate_transfer_id, meta_key, namespace, normalize_transfer_id, object_key,
    sanitize_object_path, PathError, TRANSFER_ID_ALPHABET, TRANSFER_ID_LEN,
};
pub use meta::{load_meta, save_meta, MetaError, TransferMeta};
