//! Bounded evaluation of parsed rule expressions.
//!
//! An expression is evaluated in one of two scopes:
//!
//! - **bundle scope** — the leading path segment selects entries by resource
//!   type (case-insensitive), e.g. `patient.state eq "CA"` reads the `state`
//!   property of every Patient entry; the expression matches when any entry
//!   matches.
//! - **resource scope** — paths resolve directly into one focus resource's
//!   properties, e.g. `status eq "final"` against a single observation.

use crate::error::RuleError;
use crate::expr::{ComparisonOp, LogicalOp, RuleExpression, parse_expression};
use crate::shorthand::ShorthandTable;
use labrelay_core::bundle::{Bundle, Resource};
use serde_json::Value;

/// Bounds applied to expression parsing and evaluation. A pathological
/// expression fails with [`RuleError::LimitExceeded`] instead of stalling a
/// worker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvalLimits {
    pub max_expression_len: usize,
    pub max_tokens: usize,
    pub max_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_expression_len: 4096,
            max_tokens: 512,
            max_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Bundle(&'a Bundle),
    Resource(&'a Resource),
}

/// Evaluator carrying the shorthand table and limits for one stage run.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    shorthand: ShorthandTable,
    limits: EvalLimits,
}

impl RuleEvaluator {
    pub fn new(shorthand: ShorthandTable, limits: EvalLimits) -> Self {
        Self { shorthand, limits }
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }

    /// Evaluates one expression string in bundle scope.
    ///
    /// Shorthand variables are resolved first; parse, limit, and type errors
    /// propagate (they indicate misconfiguration or corrupt data, never a
    /// legitimate filter decision).
    pub fn evaluate_bundle(&self, bundle: &Bundle, expression: &str) -> Result<bool, RuleError> {
        self.evaluate_in(Scope::Bundle(bundle), expression)
    }

    /// Evaluates one expression string against a single focus resource.
    pub fn evaluate_resource(
        &self,
        resource: &Resource,
        expression: &str,
    ) -> Result<bool, RuleError> {
        self.evaluate_in(Scope::Resource(resource), expression)
    }

    fn evaluate_in(&self, scope: Scope<'_>, expression: &str) -> Result<bool, RuleError> {
        let resolved = self.shorthand.resolve(expression)?;
        let parsed = parse_expression(&resolved, &self.limits)?;
        evaluate_parsed(scope, &parsed)
    }
}

fn evaluate_parsed(scope: Scope<'_>, expr: &RuleExpression) -> Result<bool, RuleError> {
    match expr {
        RuleExpression::Literal(value) => Ok(*value),
        RuleExpression::Exists(path) => Ok(!resolve_path(scope, path).is_empty()),
        RuleExpression::Comparison { path, op, value } => compare(scope, path, *op, value),
        RuleExpression::Logical { op, left, right } => {
            let left_result = evaluate_parsed(scope, left)?;
            match op {
                LogicalOp::And => {
                    if !left_result {
                        return Ok(false);
                    }
                    evaluate_parsed(scope, right)
                }
                LogicalOp::Or => {
                    if left_result {
                        return Ok(true);
                    }
                    evaluate_parsed(scope, right)
                }
            }
        }
        RuleExpression::Not(inner) => Ok(!evaluate_parsed(scope, inner)?),
    }
}

/// Resolves a dot-separated path in the given scope, flattening arrays at
/// every step. A missing segment resolves to the empty set.
fn resolve_path<'a>(scope: Scope<'a>, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(s) if !s.is_empty() => s,
        _ => return Vec::new(),
    };

    let mut current: Vec<&Value> = match scope {
        Scope::Resource(resource) => match resource.properties.get(first) {
            Some(value) => flatten(value),
            None => Vec::new(),
        },
        Scope::Bundle(bundle) => {
            // First segment selects entries by resource type; the next
            // segment reads their properties.
            let typed: Vec<&Resource> = bundle
                .entries
                .iter()
                .map(|e| &e.resource)
                .filter(|r| r.resource_type.eq_ignore_ascii_case(first))
                .collect();
            let prop = match segments.next() {
                Some(s) => s,
                None => return Vec::new(),
            };
            typed
                .iter()
                .filter_map(|r| r.properties.get(prop))
                .flat_map(flatten)
                .collect()
        }
    };

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            if let Value::Object(map) = value
                && let Some(child) = map.get(segment)
            {
                next.extend(flatten(child));
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other],
    }
}

fn compare(
    scope: Scope<'_>,
    path: &str,
    op: ComparisonOp,
    value: &str,
) -> Result<bool, RuleError> {
    let leaves = resolve_path(scope, path);
    match op {
        ComparisonOp::Eq => Ok(leaves.iter().any(|leaf| leaf_eq(leaf, value))),
        ComparisonOp::Ne => Ok(!leaves.iter().any(|leaf| leaf_eq(leaf, value))),
        ComparisonOp::Co => Ok(leaves
            .iter()
            .filter_map(|leaf| leaf_str(leaf))
            .any(|s| s.contains(value))),
        ComparisonOp::Sw => Ok(leaves
            .iter()
            .filter_map(|leaf| leaf_str(leaf))
            .any(|s| s.starts_with(value))),
        ComparisonOp::Ew => Ok(leaves
            .iter()
            .filter_map(|leaf| leaf_str(leaf))
            .any(|s| s.ends_with(value))),
        ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Ge | ComparisonOp::Le => {
            let rhs: f64 = value.parse().map_err(|_| RuleError::TypeMismatch {
                path: path.to_string(),
                op: op.as_str().to_string(),
                value: value.to_string(),
                found: "comparison value is not a number".to_string(),
            })?;
            let mut result = false;
            for leaf in &leaves {
                let lhs = leaf_num(leaf).ok_or_else(|| RuleError::TypeMismatch {
                    path: path.to_string(),
                    op: op.as_str().to_string(),
                    value: value.to_string(),
                    found: format!("non-numeric value {leaf}"),
                })?;
                result |= match op {
                    ComparisonOp::Gt => lhs > rhs,
                    ComparisonOp::Lt => lhs < rhs,
                    ComparisonOp::Ge => lhs >= rhs,
                    ComparisonOp::Le => lhs <= rhs,
                    _ => unreachable!(),
                };
            }
            Ok(result)
        }
    }
}

fn leaf_eq(leaf: &Value, value: &str) -> bool {
    match leaf {
        Value::String(s) => s == value,
        Value::Bool(b) => value.parse::<bool>() == Ok(*b),
        Value::Number(n) => match value.parse::<f64>() {
            Ok(rhs) => n.as_f64() == Some(rhs),
            Err(_) => false,
        },
        _ => false,
    }
}

fn leaf_str(leaf: &Value) -> Option<&str> {
    match leaf {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn leaf_num(leaf: &Value) -> Option<f64> {
    match leaf {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
