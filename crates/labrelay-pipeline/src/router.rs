//! Topic routing: which configured receivers are candidates for a bundle.

use labrelay_core::receiver::Receiver;
use labrelay_core::topic::Topic;
use labrelay_store::SettingsProvider;

use crate::error::PipelineError;

/// Candidate receivers for [`topic`]: every configured receiver on the topic
/// that is not inactive. `Testing` receivers are candidates like any other.
///
/// Bundles on a non-universal topic have no business reaching this pipeline;
/// that is a deployment wiring fault, so it fails fast instead of routing to
/// nobody.
pub async fn find_topic_receivers(
    settings: &dyn SettingsProvider,
    topic: Topic,
) -> Result<Vec<Receiver>, PipelineError> {
    if !topic.is_universal_pipeline() {
        return Err(PipelineError::configuration(format!(
            "topic {topic} is not routed by the universal pipeline"
        )));
    }
    let receivers = settings.receivers_by_topic(topic).await?;
    Ok(receivers.into_iter().filter(Receiver::is_active).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labrelay_core::receiver::CustomerStatus;
    use labrelay_store_memory::StaticSettings;

    fn settings() -> StaticSettings {
        StaticSettings::new(vec![
            Receiver::new("ca-phd", "elr", Topic::FullElr),
            Receiver::new("ca-phd", "backup", Topic::FullElr)
                .with_status(CustomerStatus::Inactive),
            Receiver::new("wa-phd", "trial", Topic::FullElr)
                .with_status(CustomerStatus::Testing),
            Receiver::new("cdc", "etor", Topic::EtorTi),
        ])
    }

    #[tokio::test]
    async fn test_excludes_only_inactive() {
        let receivers = find_topic_receivers(&settings(), Topic::FullElr)
            .await
            .unwrap();
        let names: Vec<String> = receivers.iter().map(Receiver::full_name).collect();
        assert_eq!(names, vec!["ca-phd.elr", "wa-phd.trial"]);
    }

    #[tokio::test]
    async fn test_topic_isolation() {
        let receivers = find_topic_receivers(&settings(), Topic::EtorTi).await.unwrap();
        assert_eq!(receivers.len(), 1);
        assert_eq!(receivers[0].full_name(), "cdc.etor");
    }

    #[tokio::test]
    async fn test_legacy_topic_is_rejected() {
        let err = find_topic_receivers(&settings(), Topic::Covid19)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
