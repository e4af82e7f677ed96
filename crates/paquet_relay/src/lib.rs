//! HTTP relay: router, handlers and the streaming ZIP archiver.

pub mod app;
pub mod archive;

pub use app::{build_router, AppState, RelayConfig};
pub use archive::{stream_archive, ArchiveError};
