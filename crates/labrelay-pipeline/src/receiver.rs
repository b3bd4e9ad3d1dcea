//! Receiver-filter stage: per-receiver eligibility and content pruning.
//!
//! Consumes one (bundle, receiver) pair committed by the fan-out. A filter
//! failure is a successful, terminal run: the item is closed out with a
//! lineage edge and an ITEM_FILTER_FAILED event. Only configuration drift
//! (receiver deleted or deactivated since fan-out), corrupt data, or
//! collaborator failure produce errors.

use std::sync::Arc;
use serde_json::json;
use tracing::{info, instrument};

use labrelay_core::action::ActionLog;
use labrelay_core::bundle::Bundle;
use labrelay_core::condition::ConditionSummary;
use labrelay_core::events::{EventName, PipelineEvent};
use labrelay_core::id::{LineageAction, LineageEdge, ReportId};
use labrelay_core::receiver::Receiver;
use labrelay_rules::{RuleEvaluator, ShorthandTable};
use labrelay_store::{BlobStore, EventSink, LineageStore, MessageQueue, SettingsProvider};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::filter::{FilterChain, FilterOutcome};
use crate::messages::{ReceiverFilterMessage, TranslateMessage, decode_bundle, encode_bundle};

/// Outcome of one receiver-filter run.
#[derive(Debug)]
pub struct ReceiverFilterRun {
    /// The message enqueued for translation, when the receiver qualified.
    pub translated: Option<TranslateMessage>,
    pub action_log: ActionLog,
}

/// Stateless worker for the receiver-filter stage.
pub struct ReceiverFilterStage {
    blob: Arc<dyn BlobStore>,
    queue: Arc<dyn MessageQueue>,
    settings: Arc<dyn SettingsProvider>,
    lineage: Arc<dyn LineageStore>,
    events: Arc<dyn EventSink>,
    chain: FilterChain,
    config: PipelineConfig,
}

impl ReceiverFilterStage {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        queue: Arc<dyn MessageQueue>,
        settings: Arc<dyn SettingsProvider>,
        lineage: Arc<dyn LineageStore>,
        events: Arc<dyn EventSink>,
        shorthand: ShorthandTable,
        config: PipelineConfig,
    ) -> Self {
        let chain = FilterChain::new(RuleEvaluator::new(shorthand, config.eval_limits.clone()));
        Self {
            blob,
            queue,
            settings,
            lineage,
            events,
            chain,
            config,
        }
    }

    /// Processes one queue message end to end.
    #[instrument(
        skip(self, message),
        fields(report_id = %message.report_id, receiver = %message.receiver_full_name)
    )]
    pub async fn process(
        &self,
        message: &ReceiverFilterMessage,
    ) -> Result<ReceiverFilterRun, PipelineError> {
        let receiver = self.resolve_receiver(&message.receiver_full_name).await?;

        let bytes = self.blob.download(&message.blob_url).await?;
        let bundle = decode_bundle(&bytes, &message.digest)?;

        let mut action_log = ActionLog::new();
        match self.chain.evaluate_receiver(&bundle, &receiver, &mut action_log)? {
            FilterOutcome::Pass(kept) => {
                let translated = self.forward(message, &receiver, &kept).await?;
                Ok(ReceiverFilterRun {
                    translated: Some(translated),
                    action_log,
                })
            }
            FilterOutcome::Fail {
                kind,
                failing_filters,
            } => {
                let child = self.close_out(message).await?;
                self.events
                    .emit(
                        PipelineEvent::new(
                            EventName::ItemFilterFailed,
                            child,
                            message.topic,
                            &bundle.identifier,
                        )
                        .with_parent(message.report_id)
                        .with_param("filterType", json!(kind.as_str()))
                        .with_param("failingFilters", json!(failing_filters))
                        .with_param("receiverName", json!(message.receiver_full_name)),
                    )
                    .await;
                info!(filter = kind.as_str(), "receiver dropped by filter");
                Ok(ReceiverFilterRun {
                    translated: None,
                    action_log,
                })
            }
        }
    }

    /// The receiver must still exist and still be active. Anything else is
    /// drift between fan-out time and now.
    async fn resolve_receiver(&self, full_name: &str) -> Result<Receiver, PipelineError> {
        let receiver = self
            .settings
            .receiver(full_name)
            .await?
            .ok_or_else(|| {
                PipelineError::configuration(format!("unknown receiver {full_name}"))
            })?;
        if !receiver.is_active() {
            return Err(PipelineError::configuration(format!(
                "receiver {full_name} is inactive"
            )));
        }
        Ok(receiver)
    }

    /// Uploads the kept (possibly pruned) bundle, records lineage, and hands
    /// the item to the translator.
    async fn forward(
        &self,
        message: &ReceiverFilterMessage,
        receiver: &Receiver,
        kept: &Bundle,
    ) -> Result<TranslateMessage, PipelineError> {
        let receiver_full_name = receiver.full_name();
        let child = ReportId::derive(
            message.report_id,
            &receiver_full_name,
            LineageAction::Translate,
        );
        let (bytes, digest) = encode_bundle(kept)?;
        let path = format!("translate/{child}.fhir.json");
        let blob_url = self.blob.upload(&bytes, &path).await?;
        self.lineage
            .record_edge(
                LineageEdge::new(message.report_id, child, LineageAction::Translate)
                    .for_receiver(&receiver_full_name),
            )
            .await?;

        let next = TranslateMessage {
            report_id: child,
            blob_url,
            digest,
            topic: message.topic,
            format: message.format,
            original_ingest_report_id: message.original_ingest_report_id,
            receiver_full_name: receiver_full_name.clone(),
        };
        let payload = serde_json::to_string(&next)?;
        self.queue
            .send(&self.config.translate_queue, &payload, None)
            .await?;

        self.events
            .emit(
                PipelineEvent::new(EventName::ItemAccepted, child, message.topic, &kept.identifier)
                    .with_parent(message.report_id)
                    .with_receiver(&receiver_full_name)
                    .with_condition_summary(ConditionSummary::from_bundle(kept)),
            )
            .await;
        info!(observations = kept.observations().count(), "item accepted");
        Ok(next)
    }

    /// Terminal edge for a filtered-out receiver. Returns the terminal child
    /// report id.
    async fn close_out(&self, message: &ReceiverFilterMessage) -> Result<ReportId, PipelineError> {
        let child = ReportId::derive(
            message.report_id,
            &message.receiver_full_name,
            LineageAction::None,
        );
        self.lineage
            .record_edge(
                LineageEdge::new(message.report_id, child, LineageAction::None)
                    .for_receiver(&message.receiver_full_name),
            )
            .await?;
        Ok(child)
    }
}
