//! Per-run action log: the audit trail of filter decisions.
//!
//! Filter failures are expected outcomes, never errors. Each failure produces
//! exactly one detail entry tagged with the failing filter kind so downstream
//! audit queries can distinguish why a receiver was dropped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionLogScope {
    Report,
    Item,
}

/// One audit entry describing a filter decision for one receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogDetail {
    pub scope: ActionLogScope,
    /// SCREAMING_SNAKE name of the failing filter kind, e.g. `QUALITY_FILTER`.
    pub filter_kind: String,
    pub receiver_full_name: String,
    /// External message identifier of the bundle.
    pub tracking_id: String,
    pub message: String,
}

impl ActionLogDetail {
    pub fn filtered(
        filter_kind: impl Into<String>,
        receiver_full_name: impl Into<String>,
        tracking_id: impl Into<String>,
        failing_filters: &[String],
    ) -> Self {
        let filter_kind = filter_kind.into();
        let receiver_full_name = receiver_full_name.into();
        let message = format!(
            "Item was not routed to {receiver_full_name} because it did not pass the \
             {filter_kind}. Item failed on: {}",
            failing_filters.join(", ")
        );
        Self {
            scope: ActionLogScope::Item,
            filter_kind,
            receiver_full_name,
            tracking_id: tracking_id.into(),
            message,
        }
    }
}

/// Collector for one stage run. Stages append; callers read after the run.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    details: Vec<ActionLogDetail>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, detail: ActionLogDetail) {
        self.details.push(detail);
    }

    pub fn details(&self) -> &[ActionLogDetail] {
        &self.details
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}
