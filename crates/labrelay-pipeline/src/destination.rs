//! Destination-filter stage: the fan-out point.
//!
//! One inbound message becomes zero or more receiver-filter messages, one per
//! receiver that survives topic routing and the pre-fan-out filters. For each
//! survivor the stage uploads the payload, records the lineage edge, then
//! enqueues; child ids derive deterministically from the parent so a re-run
//! overwrites its own blobs and re-records its own edges instead of
//! duplicating the fan-out.

use std::sync::Arc;
use tracing::{info, instrument};

use labrelay_core::action::ActionLog;
use labrelay_core::events::{EventName, PipelineEvent};
use labrelay_core::id::{LineageAction, LineageEdge, ReportId};
use labrelay_rules::{RuleEvaluator, ShorthandTable};
use labrelay_store::{BlobStore, EventSink, LineageStore, MessageQueue, SettingsProvider};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::filter::{FilterChain, FilterOutcome};
use crate::messages::{DestinationFilterMessage, ReceiverFilterMessage, decode_bundle};
use crate::router::find_topic_receivers;

/// Outcome of one destination-filter run, for the caller's acknowledgement
/// and audit handling.
#[derive(Debug)]
pub struct DestinationFilterRun {
    /// Messages enqueued for the receiver-filter stage, one per surviving
    /// receiver.
    pub forwarded: Vec<ReceiverFilterMessage>,
    pub action_log: ActionLog,
}

/// Stateless worker for the destination-filter stage. One instance serves
/// many messages concurrently.
pub struct DestinationFilterStage {
    blob: Arc<dyn BlobStore>,
    queue: Arc<dyn MessageQueue>,
    settings: Arc<dyn SettingsProvider>,
    lineage: Arc<dyn LineageStore>,
    events: Arc<dyn EventSink>,
    chain: FilterChain,
    config: PipelineConfig,
}

impl DestinationFilterStage {
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
    ///
    /// # Errors
    ///
    /// Configuration, malformed-bundle, and rule errors are fatal for the
    /// message; store errors may be retried by redelivering it.
    #[instrument(skip(self, message), fields(report_id = %message.report_id, topic = %message.topic))]
    pub async fn process(
        &self,
        message: &DestinationFilterMessage,
    ) -> Result<DestinationFilterRun, PipelineError> {
        let receivers = find_topic_receivers(self.settings.as_ref(), message.topic).await?;

        let bytes = self.blob.download(&message.blob_url).await?;
        let bundle = decode_bundle(&bytes, &message.digest)?;

        let mut action_log = ActionLog::new();
        let mut forwarded = Vec::new();
        for receiver in &receivers {
            let outcome = self
                .chain
                .evaluate_pre_fanout(&bundle, receiver, &mut action_log)?;
            if !matches!(outcome, FilterOutcome::Pass(_)) {
                continue;
            }

            let receiver_full_name = receiver.full_name();
            let child = ReportId::derive(
                message.report_id,
                &receiver_full_name,
                LineageAction::ReceiverFilter,
            );
            let path = format!("receiver-filter/{child}.fhir.json");
            let blob_url = self.blob.upload(&bytes, &path).await?;
            self.lineage
                .record_edge(
                    LineageEdge::new(message.report_id, child, LineageAction::ReceiverFilter)
                        .for_receiver(&receiver_full_name),
                )
                .await?;

            let next = ReceiverFilterMessage {
                report_id: child,
                blob_url,
                digest: message.digest.clone(),
                topic: message.topic,
                format: message.format,
                original_ingest_report_id: message.original_ingest_report_id,
                receiver_full_name: receiver_full_name.clone(),
            };
            let payload = serde_json::to_string(&next)?;
            self.queue
                .send(&self.config.receiver_filter_queue, &payload, None)
                .await?;

            self.events
                .emit(
                    PipelineEvent::new(
                        EventName::ItemRouted,
                        child,
                        message.topic,
                        &bundle.identifier,
                    )
                    .with_parent(message.report_id)
                    .with_receiver(&receiver_full_name),
                )
                .await;
            forwarded.push(next);
        }

        // Zero survivors is terminal success whether the topic had no
        // receivers at all or every candidate was filtered out.
        if forwarded.is_empty() {
            self.route_to_nobody(message, &bundle.identifier).await?;
        }

        info!(
            candidates = receivers.len(),
            forwarded = forwarded.len(),
            filtered = action_log.details().len(),
            "fan-out complete"
        );
        Ok(DestinationFilterRun {
            forwarded,
            action_log,
        })
    }

    /// Terminal path for a bundle no receiver wants: one lineage edge closing
    /// the item out, one not-routed event, successful ack.
    async fn route_to_nobody(
        &self,
        message: &DestinationFilterMessage,
        tracking_id: &str,
    ) -> Result<(), PipelineError> {
        let child = ReportId::derive(message.report_id, "", LineageAction::None);
        self.lineage
            .record_edge(LineageEdge::new(
                message.report_id,
                child,
                LineageAction::None,
            ))
            .await?;
        self.events
            .emit(
                PipelineEvent::new(EventName::ItemNotRouted, child, message.topic, tracking_id)
                    .with_parent(message.report_id),
            )
            .await;
        info!("no eligible receivers, item closed out");
        Ok(())
    }
}
