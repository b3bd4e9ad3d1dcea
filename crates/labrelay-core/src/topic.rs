use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Routing category that partitions receivers. A bundle is tagged with
/// exactly one topic; a receiver subscribed to one topic is never evaluated
/// for a bundle tagged with another.
///
/// Topics are a closed set. Free-text topics are rejected at parse time so a
/// misconfigured sender fails fast instead of silently routing to nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "full-elr")]
    FullElr,
    #[serde(rename = "etor-ti")]
    EtorTi,
    #[serde(rename = "elr-elims")]
    ElrElims,
    #[serde(rename = "mars-otc-elr")]
    MarsOtcElr,
    #[serde(rename = "covid-19")]
    Covid19,
    #[serde(rename = "monkeypox")]
    Monkeypox,
    #[serde(rename = "test")]
    Test,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::FullElr => "full-elr",
            Topic::EtorTi => "etor-ti",
            Topic::ElrElims => "elr-elims",
            Topic::MarsOtcElr => "mars-otc-elr",
            Topic::Covid19 => "covid-19",
            Topic::Monkeypox => "monkeypox",
            Topic::Test => "test",
        }
    }

    /// Whether bundles on this topic flow through the filter/fan-out
    /// pipeline. Legacy topics are converted and routed elsewhere.
    pub fn is_universal_pipeline(&self) -> bool {
        matches!(
            self,
            Topic::FullElr | Topic::EtorTi | Topic::ElrElims | Topic::MarsOtcElr
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Topic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-elr" => Ok(Topic::FullElr),
            "etor-ti" => Ok(Topic::EtorTi),
            "elr-elims" => Ok(Topic::ElrElims),
            "mars-otc-elr" => Ok(Topic::MarsOtcElr),
            "covid-19" => Ok(Topic::Covid19),
            "monkeypox" => Ok(Topic::Monkeypox),
            "test" => Ok(Topic::Test),
            _ => Err(CoreError::UnknownTopic(s.to_string())),
        }
    }
}
