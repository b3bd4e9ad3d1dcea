//! Collaborator interfaces consumed by the labrelay pipeline.
//!
//! The pipeline core never talks to blob storage, queues, settings, or the
//! lineage store directly; it is handed trait objects at stage construction.
//! Implementations live elsewhere (`labrelay-store-memory` for tests and
//! local runs).

pub mod error;
pub mod traits;

pub use error::StoreError;
pub use traits::{BlobStore, EventSink, LineageStore, MessageQueue, SettingsProvider};
