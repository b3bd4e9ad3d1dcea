//! Structured per-item pipeline events for observability.
//!
//! Events describe what was matched, pruned, or dropped at each stage. They
//! are independent of lineage: best-effort, never load-bearing.

use crate::condition::ConditionSummary;
use crate::id::ReportId;
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    /// Destination-filter stage produced a child for a receiver.
    ItemRouted,
    /// Destination-filter stage found zero eligible receivers.
    ItemNotRouted,
    /// Receiver-filter stage dropped the receiver on a filter failure.
    ItemFilterFailed,
    /// Receiver-filter stage forwarded a (possibly pruned) bundle.
    ItemAccepted,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ItemRouted => "ITEM_ROUTED",
            EventName::ItemNotRouted => "ITEM_NOT_ROUTED",
            EventName::ItemFilterFailed => "ITEM_FILTER_FAILED",
            EventName::ItemAccepted => "ITEM_ACCEPTED",
        }
    }
}

/// One observability event. `receiver_full_name` of `None` means the item was
/// not delivered to anyone at this step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub name: EventName,
    pub report_id: ReportId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_report_id: Option<ReportId>,
    pub topic: Topic,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub receiver_full_name: Option<String>,
    /// External message identifier of the bundle.
    pub tracking_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub condition_summary: Option<ConditionSummary>,
    /// Stage-specific detail, e.g. failing filters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub params: BTreeMap<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PipelineEvent {
    pub fn new(
        name: EventName,
        report_id: ReportId,
        topic: Topic,
        tracking_id: impl Into<String>,
    ) -> Self {
        Self {
            name,
            report_id,
            parent_report_id: None,
            topic,
            receiver_full_name: None,
            tracking_id: tracking_id.into(),
            condition_summary: None,
            params: BTreeMap::new(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_parent(mut self, parent: ReportId) -> Self {
        self.parent_report_id = Some(parent);
        self
    }

    pub fn with_receiver(mut self, receiver_full_name: impl Into<String>) -> Self {
        self.receiver_full_name = Some(receiver_full_name.into());
        self
    }

    pub fn with_condition_summary(mut self, summary: ConditionSummary) -> Self {
        self.condition_summary = Some(summary);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}
