//! In-memory implementations of every `labrelay-store` trait.
//!
//! Used by the test suites and for local runs. Each backend exposes
//! inspection helpers so tests can assert on what the pipeline produced.

pub mod blob;
pub mod events;
pub mod lineage;
pub mod queue;
pub mod settings;

pub use blob::MemoryBlobStore;
pub use events::MemoryEventSink;
pub use lineage::MemoryLineageStore;
pub use queue::MemoryQueue;
pub use settings::StaticSettings;
