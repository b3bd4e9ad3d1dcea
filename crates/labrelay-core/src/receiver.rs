//! Receiver configuration: a downstream subscriber with a topic and a set of
//! eligibility filters. Loaded from static configuration at stage start and
//! read-only for the duration of a run.

use crate::topic::Topic;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a receiver. Only `Inactive` receivers are excluded
/// from routing; `Testing` receivers route normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Testing,
}

/// How the expressions within one filter kind combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Every expression must pass (conjunction).
    #[default]
    All,
    /// At least one expression must pass. Used by routing filters that list
    /// many counties or states.
    Any,
}

/// The per-receiver filter configuration, one expression list per kind.
/// Empty lists are no-op passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiverFilters {
    pub jurisdictional: Vec<String>,
    pub quality: Vec<String>,
    pub routing: Vec<String>,
    /// Combination mode for the routing expressions.
    pub routing_mode: FilterMode,
    pub processing_mode: Vec<String>,
    /// Raw rule expressions evaluated per observation.
    pub condition: Vec<String>,
    /// Condition code set matched against stamped observation codes.
    pub mapped_condition: Vec<String>,
}

/// A configured downstream subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub organization_name: String,
    pub name: String,
    pub topic: Topic,
    #[serde(default)]
    pub customer_status: CustomerStatus,
    #[serde(default)]
    pub filters: ReceiverFilters,
}

impl Receiver {
    pub fn new(
        organization_name: impl Into<String>,
        name: impl Into<String>,
        topic: Topic,
    ) -> Self {
        Self {
            organization_name: organization_name.into(),
            name: name.into(),
            topic,
            customer_status: CustomerStatus::default(),
            filters: ReceiverFilters::default(),
        }
    }

    pub fn with_status(mut self, status: CustomerStatus) -> Self {
        self.customer_status = status;
        self
    }

    pub fn with_filters(mut self, filters: ReceiverFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Unique receiver identity, `organization.name`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.organization_name, self.name)
    }

    pub fn is_active(&self) -> bool {
        self.customer_status != CustomerStatus::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let receiver = Receiver::new("ca-phd", "elr", Topic::FullElr);
        assert_eq!(receiver.full_name(), "ca-phd.elr");
    }

    #[test]
    fn test_testing_status_routes() {
        let receiver =
            Receiver::new("ca-phd", "elr", Topic::FullElr).with_status(CustomerStatus::Testing);
        assert!(receiver.is_active());
        let receiver = receiver.with_status(CustomerStatus::Inactive);
        assert!(!receiver.is_active());
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "organizationName": "ca-phd",
            "name": "elr",
            "topic": "full-elr",
            "customerStatus": "active",
            "filters": {
                "jurisdictional": ["patient.state eq \"CA\""],
                "routing": ["patient.county eq \"Alameda\"", "patient.county eq \"Marin\""],
                "routingMode": "any",
                "mappedCondition": ["6142004"]
            }
        }"#;
        let receiver: Receiver = serde_json::from_str(json).unwrap();
        assert_eq!(receiver.full_name(), "ca-phd.elr");
        assert_eq!(receiver.filters.routing_mode, FilterMode::Any);
        assert_eq!(receiver.filters.routing.len(), 2);
        assert!(receiver.filters.quality.is_empty());
        assert_eq!(receiver.filters.mapped_condition, vec!["6142004"]);
    }
}
