//! The tree-shaped clinical document being routed.
//!
//! A bundle is immutable as received by a pipeline stage. Pruning produces a
//! new bundle value; the input is never mutated, which makes re-running a
//! stage on the same message trivially safe.

use crate::condition::ConditionCoding;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

pub const OBSERVATION_TYPE: &str = "Observation";

/// One resource inside a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    /// Arbitrary resource properties, traversed by rule expressions.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Full URLs of entries this resource references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Condition codes stamped by the upstream enrichment step. Only
    /// meaningful on observations.
    #[serde(rename = "conditionCodes", default, skip_serializing_if = "Vec::is_empty")]
    pub condition_codes: Vec<ConditionCoding>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            properties: Map::new(),
            references: Vec::new(),
            condition_codes: Vec::new(),
        }
    }

    pub fn observation(id: impl Into<String>) -> Self {
        Self::new(OBSERVATION_TYPE, id)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_reference(mut self, full_url: impl Into<String>) -> Self {
        self.references.push(full_url.into());
        self
    }

    pub fn with_condition(mut self, coding: ConditionCoding) -> Self {
        self.condition_codes.push(coding);
        self
    }

    pub fn is_observation(&self) -> bool {
        self.resource_type == OBSERVATION_TYPE
    }

    /// Codes on this observation, as plain strings.
    pub fn condition_code_values(&self) -> impl Iterator<Item = &str> {
        self.condition_codes.iter().map(|c| c.code.as_str())
    }

    /// Whether this observation's stamped codes are non-empty and all
    /// ancillary. Observations with no codes at all do not count as AOE-only.
    pub fn is_aoe_only(&self) -> bool {
        !self.condition_codes.is_empty() && self.condition_codes.iter().all(|c| c.is_aoe())
    }
}

/// One entry of a bundle: a resource addressed by its full URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: Resource,
}

impl BundleEntry {
    pub fn new(full_url: impl Into<String>, resource: Resource) -> Self {
        Self {
            full_url: full_url.into(),
            resource,
        }
    }
}

/// The tree-shaped clinical document being routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// External message identifier assigned by the sender, preserved
    /// end-to-end and used as the tracking id in logs.
    pub identifier: String,
    #[serde(default)]
    pub entries: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Observation-like entries of this bundle, in document order.
    pub fn observations(&self) -> impl Iterator<Item = &BundleEntry> {
        self.entries.iter().filter(|e| e.resource.is_observation())
    }

    pub fn entry(&self, full_url: &str) -> Option<&BundleEntry> {
        self.entries.iter().find(|e| e.full_url == full_url)
    }

    /// Validates the entry graph: full URLs must be unique and every
    /// reference must resolve to an entry in this bundle. An unresolvable
    /// reference indicates upstream corruption, not a filter decision.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.full_url.as_str()) {
                return Err(CoreError::malformed_bundle(format!(
                    "duplicate entry fullUrl: {}",
                    entry.full_url
                )));
            }
        }
        for entry in &self.entries {
            for reference in &entry.resource.references {
                if !seen.contains(reference.as_str()) {
                    return Err(CoreError::malformed_bundle(format!(
                        "entry {} references missing entry {}",
                        entry.full_url, reference
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a new bundle without the observation entries named by
    /// [`full_urls`] and without any resource left orphaned by their removal.
    ///
    /// A resource is orphaned when it was referenced only by removed
    /// observations (transitively). Non-observation roots keep their subtrees
    /// alive. Removing an already-absent URL is a no-op, so pruning is
    /// idempotent.
    pub fn remove_observations(&self, full_urls: &HashSet<String>) -> Bundle {
        let removed: HashSet<&str> = self
            .entries
            .iter()
            .filter(|e| e.resource.is_observation() && full_urls.contains(&e.full_url))
            .map(|e| e.full_url.as_str())
            .collect();
        if removed.is_empty() {
            return self.clone();
        }

        let by_url: HashMap<&str, &BundleEntry> = self
            .entries
            .iter()
            .map(|e| (e.full_url.as_str(), e))
            .collect();

        // Walk references from every surviving root. Surviving observations
        // are roots by definition (they are the elements being kept), as is
        // any entry nothing else references. Anything unreached is orphaned.
        let mut alive: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| !removed.contains(e.full_url.as_str()))
            .filter(|e| e.resource.is_observation() || !self.is_referenced(&e.full_url))
            .map(|e| e.full_url.as_str())
            .collect();
        while let Some(url) = stack.pop() {
            if removed.contains(url) || !alive.insert(url) {
                continue;
            }
            if let Some(entry) = by_url.get(url) {
                for reference in &entry.resource.references {
                    stack.push(reference.as_str());
                }
            }
        }

        // Surviving resources drop references to pruned entries so the
        // result still validates.
        let entries = self
            .entries
            .iter()
            .filter(|e| alive.contains(e.full_url.as_str()))
            .map(|e| {
                let mut entry = e.clone();
                entry
                    .resource
                    .references
                    .retain(|r| alive.contains(r.as_str()));
                entry
            })
            .collect();

        Bundle {
            identifier: self.identifier.clone(),
            entries,
        }
    }

    /// Whether any entry references [`full_url`].
    fn is_referenced(&self, full_url: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.resource.references.iter().any(|r| r == full_url))
    }
}
