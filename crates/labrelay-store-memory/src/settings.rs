use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use labrelay_core::receiver::Receiver;
use labrelay_core::topic::Topic;
use labrelay_store::{SettingsProvider, StoreError};

/// Immutable receiver configuration snapshot, built once and shared by all
/// workers. Lookup by full name is indexed; topic lookup scans.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    receivers: Arc<Vec<Receiver>>,
    by_full_name: Arc<HashMap<String, usize>>,
}

impl StaticSettings {
    pub fn new(receivers: Vec<Receiver>) -> Self {
        let by_full_name = receivers
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.full_name(), idx))
            .collect();
        Self {
            receivers: Arc::new(receivers),
            by_full_name: Arc::new(by_full_name),
        }
    }

    /// Loads a snapshot from a JSON array of receivers.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let receivers: Vec<Receiver> = serde_json::from_str(json)?;
        Ok(Self::new(receivers))
    }

    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn receiver(&self, full_name: &str) -> Result<Option<Receiver>, StoreError> {
        Ok(self
            .by_full_name
            .get(full_name)
            .map(|&idx| self.receivers[idx].clone()))
    }

    async fn receivers_by_topic(&self, topic: Topic) -> Result<Vec<Receiver>, StoreError> {
        Ok(self
            .receivers
            .iter()
            .filter(|r| r.topic == topic)
            .cloned()
            .collect())
    }
}
