//! Trait contracts for the pipeline's external collaborators.
//!
//! All traits are object-safe and `Send + Sync`; stages hold them as
//! `Arc<dyn Trait>` and may be cloned freely across workers.

use async_trait::async_trait;
use std::time::Duration;

use labrelay_core::events::PipelineEvent;
use labrelay_core::id::{LineageAction, LineageEdge, ReportId};
use labrelay_core::receiver::Receiver;
use labrelay_core::topic::Topic;

use crate::error::StoreError;

/// Content store for bundle payloads. Content-addressed by path convention
/// only; no versioning contract is assumed.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Downloads the payload at [`url`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for a missing blob and
    /// `StoreError::Unavailable` for infrastructure failures.
    async fn download(&self, url: &str) -> Result<Vec<u8>, StoreError>;

    /// Uploads [`bytes`] under [`path`] and returns the resulting URL.
    /// Re-uploading the same bytes to the same path must be safe.
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StoreError>;
}

/// At-least-once message queue with no ordering guarantee. Payloads are the
/// serialized form of a stage message; the queue neither inspects nor
/// deserializes them.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(
        &self,
        queue_name: &str,
        payload: &str,
        visibility_delay: Option<Duration>,
    ) -> Result<(), StoreError>;
}

/// Read-only snapshot of receiver configuration. Safe for concurrent access
/// by all workers; never mutated during a run.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Resolves one receiver by its unique `organization.name`.
    async fn receiver(&self, full_name: &str) -> Result<Option<Receiver>, StoreError>;

    /// All receivers configured for [`topic`], regardless of status.
    async fn receivers_by_topic(&self, topic: Topic) -> Result<Vec<Receiver>, StoreError>;
}

/// Durable record of parent/child report relationships.
///
/// The full descendant set of a root report id must reconstruct every report
/// produced for every receiver at every stage. Edges are append-only;
/// re-recording an existing `(parent, child, action)` is an idempotent no-op,
/// never a duplicate error. Callers polling mid-fan-out may observe a
/// partial descendant set.
#[async_trait]
pub trait LineageStore: Send + Sync {
    async fn record_edge(&self, edge: LineageEdge) -> Result<(), StoreError>;

    /// Transitive closure of children below [`root`], order unspecified.
    async fn descendants(&self, root: ReportId) -> Result<Vec<ReportId>, StoreError>;

    /// Number of edges below [`root`] recorded with [`action`], optionally
    /// restricted to one receiver. Used by callers to verify a fan-out.
    async fn count_by_action(
        &self,
        root: ReportId,
        action: LineageAction,
        receiver_full_name: Option<&str>,
    ) -> Result<usize, StoreError>;
}

/// Best-effort observability sink. Implementations must swallow and log
/// their own failures; emitting an event never blocks pipeline progress.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: PipelineEvent);
}
