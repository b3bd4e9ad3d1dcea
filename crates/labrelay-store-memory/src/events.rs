use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use labrelay_core::events::{EventName, PipelineEvent};
use labrelay_store::EventSink;

/// Event sink that collects into a vector, for test assertions.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<RwLock<Vec<PipelineEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().await.clone()
    }

    pub async fn events_named(&self, name: EventName) -> Vec<PipelineEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: PipelineEvent) {
        debug!(name = event.name.as_str(), report_id = %event.report_id, "pipeline event");
        self.events.write().await.push(event);
    }
}
