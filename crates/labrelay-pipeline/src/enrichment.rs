//! Receiver-specific enrichment applied after filtering, before translation.
//!
//! Enrichers mutate a copy of the accepted bundle for one receiver, e.g.
//! stamping receiver-requested defaults. The stage re-checks the receiver,
//! applies the hook, and re-uploads only when the enricher changed anything.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use labrelay_core::bundle::Bundle;
use labrelay_core::receiver::Receiver;
use labrelay_store::{BlobStore, SettingsProvider};

use crate::error::PipelineError;
use crate::messages::{TranslateMessage, decode_bundle, encode_bundle};

/// A receiver-scoped bundle transformation.
#[async_trait]
pub trait ReceiverEnricher: Send + Sync {
    async fn enrich(&self, bundle: Bundle, receiver: &Receiver) -> Result<Bundle, PipelineError>;
}

/// Identity enricher, used when a deployment configures no enrichment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

#[async_trait]
impl ReceiverEnricher for NoopEnricher {
    async fn enrich(&self, bundle: Bundle, _receiver: &Receiver) -> Result<Bundle, PipelineError> {
        Ok(bundle)
    }
}

/// Stateless worker applying one enricher between the receiver-filter stage
/// and the translator.
pub struct ReceiverEnrichmentStage {
    blob: Arc<dyn BlobStore>,
    settings: Arc<dyn SettingsProvider>,
    enricher: Arc<dyn ReceiverEnricher>,
}

impl ReceiverEnrichmentStage {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        settings: Arc<dyn SettingsProvider>,
        enricher: Arc<dyn ReceiverEnricher>,
    ) -> Self {
        Self {
            blob,
            settings,
            enricher,
        }
    }

    /// Enriches the payload behind [`message`] in place and returns the
    /// message to forward, with a fresh digest when the payload changed.
    #[instrument(
        skip(self, message),
        fields(report_id = %message.report_id, receiver = %message.receiver_full_name)
    )]
    pub async fn process(&self, message: &TranslateMessage) -> Result<TranslateMessage, PipelineError> {
        let receiver = self
            .settings
            .receiver(&message.receiver_full_name)
            .await?
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "unknown receiver {}",
                    message.receiver_full_name
                ))
            })?;
        if !receiver.is_active() {
            return Err(PipelineError::configuration(format!(
                "receiver {} is inactive",
                message.receiver_full_name
            )));
        }

        let bytes = self.blob.download(&message.blob_url).await?;
        let bundle = decode_bundle(&bytes, &message.digest)?;
        let enriched = self.enricher.enrich(bundle.clone(), &receiver).await?;
        enriched.validate()?;
        if enriched == bundle {
            return Ok(message.clone());
        }

        let (bytes, digest) = encode_bundle(&enriched)?;
        // Same path: the report id did not change, only its content.
        let path = format!("translate/{}.fhir.json", message.report_id);
        let blob_url = self.blob.upload(&bytes, &path).await?;
        info!("bundle enriched for receiver");
        Ok(TranslateMessage {
            blob_url,
            digest,
            ..message.clone()
        })
    }
}
