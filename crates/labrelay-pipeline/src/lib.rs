//! The filter, routing, and fan-out pipeline.
//!
//! One inbound bundle fans out to zero or more receivers across three
//! queue-separated stages:
//!
//! ```text
//! destination-filter --(N receivers)--> receiver-filter --(<=N)--> enrichment/translate
//! ```
//!
//! Each stage is a stateless worker invoked once per queue message, safe to
//! re-run on the same input. Filter decisions are audit records, never
//! errors; only configuration and malformed-data problems fail a message.

pub mod config;
pub mod destination;
pub mod enrichment;
pub mod error;
pub mod filter;
pub mod messages;
pub mod prune;
pub mod router;
pub mod receiver;

pub use config::PipelineConfig;
pub use destination::{DestinationFilterRun, DestinationFilterStage};
pub use enrichment::{NoopEnricher, ReceiverEnricher, ReceiverEnrichmentStage};
pub use error::PipelineError;
pub use filter::{FilterChain, FilterKind, FilterOutcome};
pub use messages::{
    DestinationFilterMessage, PayloadFormat, ReceiverFilterMessage, TranslateMessage,
};
pub use receiver::{ReceiverFilterRun, ReceiverFilterStage};
pub use router::find_topic_receivers;
