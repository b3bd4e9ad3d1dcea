//! Content pruning: reducing a bundle to the observations a receiver is
//! entitled to.
//!
//! Both pruning paths share one rule: a result whose remaining observations
//! are all ancillary (AOE) does not count as deliverable content, even
//! though pruning left nonzero entries. Receivers are dropped entirely
//! rather than sent an ancillary-only bundle.

use std::collections::HashSet;

use labrelay_core::bundle::Bundle;
use labrelay_rules::RuleEvaluator;
use tracing::info;

use crate::error::PipelineError;

/// Result of a pruning pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PruneOutcome {
    /// At least one deliverable observation remains; the (possibly reduced)
    /// bundle is what gets forwarded.
    Kept(Bundle),
    /// Pruning removed everything deliverable.
    Emptied,
}

/// Applies a receiver's condition filter: each expression is evaluated per
/// observation and an observation survives when ANY expression passes.
pub fn apply_condition_filter(
    evaluator: &RuleEvaluator,
    bundle: &Bundle,
    expressions: &[String],
) -> Result<PruneOutcome, PipelineError> {
    let mut kept = Vec::new();
    let mut removed = HashSet::new();
    for entry in bundle.observations() {
        let mut passed = false;
        for expression in expressions {
            if evaluator.evaluate_resource(&entry.resource, expression)? {
                passed = true;
                break;
            }
        }
        if passed {
            kept.push(entry);
        } else {
            removed.insert(entry.full_url.clone());
        }
    }

    if kept.is_empty() || kept.iter().all(|e| e.resource.is_aoe_only()) {
        return Ok(PruneOutcome::Emptied);
    }
    for url in &removed {
        info!(observation = %url, "observation filtered from bundle");
    }
    Ok(PruneOutcome::Kept(bundle.remove_observations(&removed)))
}

/// Applies a receiver's mapped-condition filter: an observation survives
/// when its stamped condition codes intersect the configured code set. An
/// empty code set is a no-op pass.
pub fn apply_mapped_condition_filter(bundle: &Bundle, code_set: &[String]) -> PruneOutcome {
    if code_set.is_empty() {
        return PruneOutcome::Kept(bundle.clone());
    }
    let codes: HashSet<&str> = code_set.iter().map(String::as_str).collect();

    let mut kept = Vec::new();
    let mut removed = HashSet::new();
    for entry in bundle.observations() {
        if entry
            .resource
            .condition_code_values()
            .any(|code| codes.contains(code))
        {
            kept.push(entry);
        } else {
            removed.insert(entry.full_url.clone());
        }
    }

    if kept.is_empty() || kept.iter().all(|e| e.resource.is_aoe_only()) {
        return PruneOutcome::Emptied;
    }
    for url in &removed {
        info!(observation = %url, "observation filtered from bundle");
    }
    PruneOutcome::Kept(bundle.remove_observations(&removed))
}
