use labrelay_rules::EvalLimits;
use serde::{Deserialize, Serialize};

/// Stage wiring configuration: queue names and rule evaluation bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub destination_filter_queue: String,
    pub receiver_filter_queue: String,
    pub translate_queue: String,
    pub eval_limits: EvalLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination_filter_queue: "destination-filter".to_string(),
            receiver_filter_queue: "receiver-filter".to_string(),
            translate_queue: "translate".to_string(),
            eval_limits: EvalLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.receiver_filter_queue, "receiver-filter");
        assert_eq!(config.eval_limits.max_depth, 32);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"translateQueue": "translate-v2"}"#).unwrap();
        assert_eq!(config.translate_queue, "translate-v2");
        assert_eq!(config.destination_filter_queue, "destination-filter");
    }
}
