use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use labrelay_store::{MessageQueue, StoreError};

/// Queue backed by per-queue payload vectors. Visibility delay is recorded
/// but not enforced; tests pop messages directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    queues: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// All payloads sent to [`queue_name`], in send order.
    pub async fn payloads(&self, queue_name: &str) -> Vec<String> {
        let queues = self.queues.read().await;
        queues.get(queue_name).cloned().unwrap_or_default()
    }

    pub async fn len(&self, queue_name: &str) -> usize {
        self.payloads(queue_name).await.len()
    }

    pub async fn is_empty(&self, queue_name: &str) -> bool {
        self.len(queue_name).await == 0
    }

    /// Removes and returns the oldest payload, for test harness loops.
    pub async fn pop(&self, queue_name: &str) -> Option<String> {
        let mut queues = self.queues.write().await;
        let queue = queues.get_mut(queue_name)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(
        &self,
        queue_name: &str,
        payload: &str,
        _visibility_delay: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut queues = self.queues.write().await;
        queues
            .entry(queue_name.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(())
    }
}
