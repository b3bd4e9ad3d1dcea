//! Report identifiers and lineage actions.
//!
//! Every report produced anywhere in the pipeline carries a `ReportId`. Root
//! ingestion reports get a random id; reports derived for a specific receiver
//! at a specific stage derive their id deterministically from the parent, so
//! that re-running a stage on the same input reproduces the same child ids,
//! blob paths, and lineage edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace for deterministic child report id derivation.
const REPORT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

/// Identifier of one report anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(Uuid);

impl ReportId {
    /// New random id for a root ingestion report.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic child id for a report derived from [`parent`] on behalf
    /// of one receiver at one pipeline action. Re-deriving with the same
    /// inputs yields the same id.
    pub fn derive(parent: ReportId, receiver_full_name: &str, action: LineageAction) -> Self {
        let name = format!("{}/{}/{}", parent.0, receiver_full_name, action.as_str());
        Self(Uuid::new_v5(&REPORT_ID_NAMESPACE, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for ReportId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Pipeline action recorded on a lineage edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageAction {
    DestinationFilter,
    ReceiverFilter,
    Translate,
    /// Terminal child: no receivers matched, or a receiver was filtered out.
    None,
}

impl LineageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineageAction::DestinationFilter => "destination_filter",
            LineageAction::ReceiverFilter => "receiver_filter",
            LineageAction::Translate => "translate",
            LineageAction::None => "none",
        }
    }
}

impl fmt::Display for LineageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parent/child edge in the report lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageEdge {
    pub parent: ReportId,
    pub child: ReportId,
    pub action: LineageAction,
    /// Receiver the child was produced for, when the action is receiver-scoped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub receiver_full_name: Option<String>,
}

impl LineageEdge {
    pub fn new(parent: ReportId, child: ReportId, action: LineageAction) -> Self {
        Self {
            parent,
            child,
            action,
            receiver_full_name: None,
        }
    }

    pub fn for_receiver(mut self, receiver_full_name: impl Into<String>) -> Self {
        self.receiver_full_name = Some(receiver_full_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_id_roundtrip() {
        let id = ReportId::new();
        let parsed: ReportId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let parent = ReportId::new();
        let a = ReportId::derive(parent, "phd.elr", LineageAction::ReceiverFilter);
        let b = ReportId::derive(parent, "phd.elr", LineageAction::ReceiverFilter);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_differs_by_receiver_and_action() {
        let parent = ReportId::new();
        let a = ReportId::derive(parent, "phd.elr", LineageAction::ReceiverFilter);
        let b = ReportId::derive(parent, "phd.secondary", LineageAction::ReceiverFilter);
        let c = ReportId::derive(parent, "phd.elr", LineageAction::Translate);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_lineage_action_names() {
        assert_eq!(LineageAction::DestinationFilter.as_str(), "destination_filter");
        assert_eq!(LineageAction::None.to_string(), "none");
    }
}
