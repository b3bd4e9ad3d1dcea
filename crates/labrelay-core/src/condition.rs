//! Condition codes attached to observations and the derived summary used by
//! observability.
//!
//! Codes are stamped onto observations by an upstream enrichment step; this
//! crate only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ancillary "ask at order entry" marker code. Observations carrying only
/// this code never satisfy condition-based filtering.
pub const AOE_CODE: &str = "AOE";

/// A coded clinical concept attached to an observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionCoding {
    pub system: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display: Option<String>,
}

impl ConditionCoding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn is_aoe(&self) -> bool {
        self.code.eq_ignore_ascii_case(AOE_CODE)
    }
}

impl fmt::Display for ConditionCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)
    }
}

/// Read-only projection of a bundle's observation condition codes, recomputed
/// on demand for observability events. Never persisted as pipeline state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSummary {
    /// Sorted, de-duplicated condition codes across all observations.
    pub codes: Vec<String>,
    pub observation_count: usize,
}

impl ConditionSummary {
    pub fn from_bundle(bundle: &crate::bundle::Bundle) -> Self {
        let mut codes: Vec<String> = bundle
            .observations()
            .flat_map(|obs| obs.resource.condition_codes.iter())
            .map(|coding| coding.code.clone())
            .collect();
        codes.sort();
        codes.dedup();
        Self {
            codes,
            observation_count: bundle.observations().count(),
        }
    }
}
