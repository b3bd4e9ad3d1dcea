//! The ordered receiver filter chain.
//!
//! Order is fixed by the domain: jurisdictional → quality → routing →
//! processing-mode → condition → mapped-condition, cheapest first. The chain
//! short-circuits on the first failing kind, so a receiver failing several
//! kinds is always recorded against the earliest one.

use labrelay_core::action::{ActionLog, ActionLogDetail};
use labrelay_core::bundle::Bundle;
use labrelay_core::receiver::{FilterMode, Receiver};
use labrelay_rules::RuleEvaluator;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;
use crate::prune::{PruneOutcome, apply_condition_filter, apply_mapped_condition_filter};

/// The closed set of filter kinds, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterKind {
    JurisdictionalFilter,
    QualityFilter,
    RoutingFilter,
    ProcessingModeFilter,
    ConditionFilter,
    MappedConditionFilter,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::JurisdictionalFilter => "JURISDICTIONAL_FILTER",
            FilterKind::QualityFilter => "QUALITY_FILTER",
            FilterKind::RoutingFilter => "ROUTING_FILTER",
            FilterKind::ProcessingModeFilter => "PROCESSING_MODE_FILTER",
            FilterKind::ConditionFilter => "CONDITION_FILTER",
            FilterKind::MappedConditionFilter => "MAPPED_CONDITION_FILTER",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running the chain for one receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The receiver qualifies; the carried bundle is what gets forwarded
    /// (pruned when condition filtering removed some observations).
    Pass(Bundle),
    /// The receiver is dropped; exactly one of these per receiver per run.
    Fail {
        kind: FilterKind,
        failing_filters: Vec<String>,
    },
}

impl FilterOutcome {
    fn fail(kind: FilterKind, failing_filters: Vec<String>) -> Self {
        Self::Fail {
            kind,
            failing_filters,
        }
    }
}

/// Evaluates one receiver's filters against one bundle. Holds the rule
/// evaluator (shorthand table + limits) for the stage run.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    evaluator: RuleEvaluator,
}

impl FilterChain {
    pub fn new(evaluator: RuleEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// The pre-fan-out subset run by the destination-filter stage before a
    /// receiver is committed to. Jurisdictional only today.
    pub fn evaluate_pre_fanout(
        &self,
        bundle: &Bundle,
        receiver: &Receiver,
        log: &mut ActionLog,
    ) -> Result<FilterOutcome, PipelineError> {
        if let Some(failing) = self.boolean_kind(
            bundle,
            &receiver.filters.jurisdictional,
            FilterMode::All,
        )? {
            let kind = FilterKind::JurisdictionalFilter;
            log.warn(ActionLogDetail::filtered(
                kind.as_str(),
                receiver.full_name(),
                &bundle.identifier,
                &failing,
            ));
            return Ok(FilterOutcome::fail(kind, failing));
        }
        Ok(FilterOutcome::Pass(bundle.clone()))
    }

    /// The remaining chain run by the receiver-filter stage: quality →
    /// routing → processing-mode → condition → mapped-condition.
    pub fn evaluate_receiver(
        &self,
        bundle: &Bundle,
        receiver: &Receiver,
        log: &mut ActionLog,
    ) -> Result<FilterOutcome, PipelineError> {
        let filters = &receiver.filters;
        let boolean_kinds: [(FilterKind, &[String], FilterMode); 3] = [
            (FilterKind::QualityFilter, &filters.quality, FilterMode::All),
            (FilterKind::RoutingFilter, &filters.routing, filters.routing_mode),
            (
                FilterKind::ProcessingModeFilter,
                &filters.processing_mode,
                FilterMode::All,
            ),
        ];
        for (kind, expressions, mode) in boolean_kinds {
            if let Some(failing) = self.boolean_kind(bundle, expressions, mode)? {
                log.warn(ActionLogDetail::filtered(
                    kind.as_str(),
                    receiver.full_name(),
                    &bundle.identifier,
                    &failing,
                ));
                return Ok(FilterOutcome::fail(kind, failing));
            }
        }
        self.condition_kinds(bundle, receiver, log)
    }

    /// Evaluates one boolean filter kind against the whole bundle. Returns
    /// the failing expressions, or `None` on pass. An empty expression list
    /// is a no-op pass.
    fn boolean_kind(
        &self,
        bundle: &Bundle,
        expressions: &[String],
        mode: FilterMode,
    ) -> Result<Option<Vec<String>>, PipelineError> {
        if expressions.is_empty() {
            return Ok(None);
        }
        let mut failing = Vec::new();
        for expression in expressions {
            let passed = self.evaluator.evaluate_bundle(bundle, expression)?;
            match (mode, passed) {
                (FilterMode::Any, true) => return Ok(None),
                (FilterMode::All, false) | (FilterMode::Any, false) => {
                    failing.push(expression.clone());
                }
                (FilterMode::All, true) => {}
            }
        }
        if failing.is_empty() {
            return Ok(None);
        }
        match mode {
            // Conjunction: any recorded failure fails the kind.
            FilterMode::All => Ok(Some(failing)),
            // Disjunction: reaching here means nothing passed.
            FilterMode::Any => Ok(Some(failing)),
        }
    }

    /// Condition and mapped-condition filtering, with content pruning.
    /// Configuring both on one receiver is rejected: their interaction is
    /// undefined and would produce unauditable decisions.
    fn condition_kinds(
        &self,
        bundle: &Bundle,
        receiver: &Receiver,
        log: &mut ActionLog,
    ) -> Result<FilterOutcome, PipelineError> {
        let condition = &receiver.filters.condition;
        let mapped = &receiver.filters.mapped_condition;
        if !condition.is_empty() && !mapped.is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} configures both a condition filter and a mapped-condition filter; \
                 only one is allowed",
                receiver.full_name()
            )));
        }

        if !condition.is_empty() {
            let kind = FilterKind::ConditionFilter;
            return match apply_condition_filter(&self.evaluator, bundle, condition)? {
                PruneOutcome::Kept(pruned) => Ok(FilterOutcome::Pass(pruned)),
                PruneOutcome::Emptied => {
                    log.warn(ActionLogDetail::filtered(
                        kind.as_str(),
                        receiver.full_name(),
                        &bundle.identifier,
                        condition,
                    ));
                    Ok(FilterOutcome::fail(kind, condition.clone()))
                }
            };
        }

        if !mapped.is_empty() {
            let kind = FilterKind::MappedConditionFilter;
            return match apply_mapped_condition_filter(bundle, mapped) {
                PruneOutcome::Kept(pruned) => Ok(FilterOutcome::Pass(pruned)),
                PruneOutcome::Emptied => {
                    log.warn(ActionLogDetail::filtered(
                        kind.as_str(),
                        receiver.full_name(),
                        &bundle.identifier,
                        mapped,
                    ));
                    Ok(FilterOutcome::fail(kind, mapped.clone()))
                }
            };
        }

        Ok(FilterOutcome::Pass(bundle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labrelay_core::bundle::{BundleEntry, Resource};
    use labrelay_core::condition::ConditionCoding;
    use labrelay_core::receiver::ReceiverFilters;
    use labrelay_core::topic::Topic;
    use serde_json::json;

    fn bundle() -> Bundle {
        Bundle::new("msg-1")
            .with_entry(BundleEntry::new(
                "Patient/p1",
                Resource::new("Patient", "p1").with_property("state", json!("CA")),
            ))
            .with_entry(BundleEntry::new(
                "Observation/o1",
                Resource::observation("o1")
                    .with_property("status", json!("final"))
                    .with_condition(ConditionCoding::new("sct", "6142004")),
            ))
    }

    fn receiver(filters: ReceiverFilters) -> Receiver {
        Receiver::new("ca-phd", "elr", Topic::FullElr).with_filters(filters)
    }

    fn chain() -> FilterChain {
        FilterChain::default()
    }

    #[test]
    fn test_empty_filters_pass() {
        let mut log = ActionLog::new();
        let outcome = chain()
            .evaluate_receiver(&bundle(), &receiver(ReceiverFilters::default()), &mut log)
            .unwrap();
        assert!(matches!(outcome, FilterOutcome::Pass(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_short_circuit_records_earliest_kind() {
        // Fails quality AND routing; only quality may be recorded.
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            quality: vec!["false".to_string()],
            routing: vec!["false".to_string()],
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_receiver(&bundle(), &receiver(filters), &mut log)
            .unwrap();
        match outcome {
            FilterOutcome::Fail { kind, .. } => assert_eq!(kind, FilterKind::QualityFilter),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(log.details().len(), 1);
        assert_eq!(log.details()[0].filter_kind, "QUALITY_FILTER");
    }

    #[test]
    fn test_routing_any_mode_passes_on_one_match() {
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            routing: vec![
                "patient.state eq \"WA\"".to_string(),
                "patient.state eq \"CA\"".to_string(),
            ],
            routing_mode: FilterMode::Any,
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_receiver(&bundle(), &receiver(filters), &mut log)
            .unwrap();
        assert!(matches!(outcome, FilterOutcome::Pass(_)));
    }

    #[test]
    fn test_routing_all_mode_fails_on_one_miss() {
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            routing: vec![
                "patient.state eq \"WA\"".to_string(),
                "patient.state eq \"CA\"".to_string(),
            ],
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_receiver(&bundle(), &receiver(filters), &mut log)
            .unwrap();
        match outcome {
            FilterOutcome::Fail {
                kind,
                failing_filters,
            } => {
                assert_eq!(kind, FilterKind::RoutingFilter);
                assert_eq!(failing_filters, vec!["patient.state eq \"WA\"".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_condition_filter_false_fails_with_kind() {
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            condition: vec!["false".to_string()],
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_receiver(&bundle(), &receiver(filters), &mut log)
            .unwrap();
        match outcome {
            FilterOutcome::Fail { kind, .. } => assert_eq!(kind, FilterKind::ConditionFilter),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(log.details().len(), 1);
        assert_eq!(log.details()[0].filter_kind, "CONDITION_FILTER");
    }

    #[test]
    fn test_mapped_condition_prunes_and_passes() {
        let mut log = ActionLog::new();
        let two_obs = bundle().with_entry(BundleEntry::new(
            "Observation/o2",
            Resource::observation("o2").with_condition(ConditionCoding::new("sct", "foo")),
        ));
        let filters = ReceiverFilters {
            mapped_condition: vec!["6142004".to_string()],
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_receiver(&two_obs, &receiver(filters), &mut log)
            .unwrap();
        match outcome {
            FilterOutcome::Pass(pruned) => {
                assert_eq!(pruned.observations().count(), 1);
                assert!(pruned.entry("Observation/o1").is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(log.is_empty());
    }

    #[test]
    fn test_both_condition_kinds_is_configuration_error() {
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            condition: vec!["true".to_string()],
            mapped_condition: vec!["6142004".to_string()],
            ..ReceiverFilters::default()
        };
        let err = chain()
            .evaluate_receiver(&bundle(), &receiver(filters), &mut log)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_pre_fanout_runs_jurisdictional_only() {
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            jurisdictional: vec!["patient.state eq \"WA\"".to_string()],
            quality: vec!["false".to_string()],
            ..ReceiverFilters::default()
        };
        let outcome = chain()
            .evaluate_pre_fanout(&bundle(), &receiver(filters.clone()), &mut log)
            .unwrap();
        assert!(matches!(
            outcome,
            FilterOutcome::Fail {
                kind: FilterKind::JurisdictionalFilter,
                ..
            }
        ));

        // Quality is not part of the pre-fan-out subset.
        let mut log = ActionLog::new();
        let filters = ReceiverFilters {
            jurisdictional: vec!["patient.state eq \"CA\"".to_string()],
            quality: vec!["false".to_string()],
            ..filters
        };
        let outcome = chain()
            .evaluate_pre_fanout(&bundle(), &receiver(filters), &mut log)
            .unwrap();
        assert!(matches!(outcome, FilterOutcome::Pass(_)));
    }
}
