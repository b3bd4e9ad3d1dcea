//! End-to-end fan-out over the in-memory backends: destination filter,
//! receiver filter, and enrichment chained through real queue payloads.

use std::sync::Arc;

use labrelay_core::bundle::{Bundle, BundleEntry, Resource};
use labrelay_core::condition::ConditionCoding;
use labrelay_core::events::EventName;
use labrelay_core::id::{LineageAction, ReportId};
use labrelay_core::receiver::{CustomerStatus, Receiver, ReceiverFilters};
use labrelay_core::topic::Topic;
use labrelay_pipeline::messages::{DestinationFilterMessage, PayloadFormat, encode_bundle};
use labrelay_pipeline::{
    DestinationFilterStage, NoopEnricher, PipelineConfig, ReceiverEnrichmentStage,
    ReceiverFilterStage, TranslateMessage,
};
use labrelay_rules::ShorthandTable;
use labrelay_store::{BlobStore, LineageStore};
use labrelay_store_memory::{
    MemoryBlobStore, MemoryEventSink, MemoryLineageStore, MemoryQueue, StaticSettings,
};
use serde_json::json;

struct Pipeline {
    destination: DestinationFilterStage,
    receiver: ReceiverFilterStage,
    enrichment: ReceiverEnrichmentStage,
    blob: Arc<MemoryBlobStore>,
    queue: Arc<MemoryQueue>,
    lineage: Arc<MemoryLineageStore>,
    events: Arc<MemoryEventSink>,
}

impl Pipeline {
    fn new(receivers: Vec<Receiver>) -> Self {
        let blob = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let settings = Arc::new(StaticSettings::new(receivers));
        let lineage = Arc::new(MemoryLineageStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let config = PipelineConfig::default();
        Self {
            destination: DestinationFilterStage::new(
                blob.clone(),
                queue.clone(),
                settings.clone(),
                lineage.clone(),
                events.clone(),
                ShorthandTable::default(),
                config.clone(),
            ),
            receiver: ReceiverFilterStage::new(
                blob.clone(),
                queue.clone(),
                settings.clone(),
                lineage.clone(),
                events.clone(),
                ShorthandTable::default(),
                config,
            ),
            enrichment: ReceiverEnrichmentStage::new(
                blob.clone(),
                settings,
                Arc::new(NoopEnricher),
            ),
            blob,
            queue,
            lineage,
            events,
        }
    }

    async fn ingest(&self, bundle: &Bundle) -> DestinationFilterMessage {
        let (bytes, digest) = encode_bundle(bundle).unwrap();
        let report_id = ReportId::new();
        let blob_url = self
            .blob
            .seed(&format!("destination-filter/{report_id}.fhir.json"), bytes)
            .await;
        DestinationFilterMessage {
            report_id,
            blob_url,
            digest,
            topic: Topic::FullElr,
            format: PayloadFormat::Fhir,
            original_ingest_report_id: report_id,
        }
    }

    /// Drains the receiver-filter queue through the receiver stage, then the
    /// translate queue through enrichment, like the workers would.
    async fn drain(&self) -> Vec<TranslateMessage> {
        while let Some(payload) = self.queue.pop("receiver-filter").await {
            let message = serde_json::from_str(&payload).unwrap();
            self.receiver.process(&message).await.unwrap();
        }
        let mut delivered = Vec::new();
        while let Some(payload) = self.queue.pop("translate").await {
            let message: TranslateMessage = serde_json::from_str(&payload).unwrap();
            delivered.push(self.enrichment.process(&message).await.unwrap());
        }
        delivered
    }
}

fn lab_bundle() -> Bundle {
    Bundle::new("lab-result-42")
        .with_entry(BundleEntry::new(
            "Patient/p1",
            Resource::new("Patient", "p1").with_property("state", json!("CA")),
        ))
        .with_entry(BundleEntry::new(
            "Observation/flu",
            Resource::observation("flu")
                .with_reference("Specimen/s1")
                .with_condition(ConditionCoding::new("sct", "6142004")),
        ))
        .with_entry(BundleEntry::new(
            "Observation/covid",
            Resource::observation("covid")
                .with_reference("Specimen/s1")
                .with_condition(ConditionCoding::new("sct", "840539006")),
        ))
        .with_entry(BundleEntry::new(
            "Specimen/s1",
            Resource::new("Specimen", "s1"),
        ))
}

#[tokio::test]
async fn fan_out_reaches_every_active_receiver() {
    let pipeline = Pipeline::new(vec![
        Receiver::new("ca-phd", "elr", Topic::FullElr),
        Receiver::new("wa-phd", "elr", Topic::FullElr),
        Receiver::new("or-phd", "elr", Topic::FullElr).with_status(CustomerStatus::Inactive),
    ]);
    let message = pipeline.ingest(&lab_bundle()).await;
    let run = pipeline.destination.process(&message).await.unwrap();
    assert_eq!(run.forwarded.len(), 2);

    let delivered = pipeline.drain().await;
    assert_eq!(delivered.len(), 2);
    let mut names: Vec<&str> = delivered
        .iter()
        .map(|m| m.receiver_full_name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["ca-phd.elr", "wa-phd.elr"]);

    // Lineage reconstructs the whole fan-out from the root id.
    let root = message.report_id;
    assert_eq!(pipeline.lineage.descendants(root).await.unwrap().len(), 4);
    assert_eq!(
        pipeline
            .lineage
            .count_by_action(root, LineageAction::ReceiverFilter, None)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        pipeline
            .lineage
            .count_by_action(root, LineageAction::Translate, Some("ca-phd.elr"))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        pipeline
            .events
            .events_named(EventName::ItemAccepted)
            .await
            .len(),
        2
    );
}

#[tokio::test]
async fn condition_filter_drops_receiver_end_to_end() {
    let pipeline = Pipeline::new(vec![
        Receiver::new("ca-phd", "elr", Topic::FullElr).with_filters(ReceiverFilters {
            condition: vec!["false".to_string()],
            ..ReceiverFilters::default()
        }),
    ]);
    let message = pipeline.ingest(&lab_bundle()).await;
    pipeline.destination.process(&message).await.unwrap();
    let delivered = pipeline.drain().await;

    assert!(delivered.is_empty());
    let failed = pipeline.events.events_named(EventName::ItemFilterFailed).await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].params["filterType"], "CONDITION_FILTER");
    // The fan-out edge and the terminal edge are both present.
    assert_eq!(
        pipeline
            .lineage
            .count_by_action(message.report_id, LineageAction::ReceiverFilter, None)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        pipeline
            .lineage
            .count_by_action(message.report_id, LineageAction::None, None)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn mapped_condition_prunes_per_receiver() {
    let pipeline = Pipeline::new(vec![
        Receiver::new("flu-registry", "elr", Topic::FullElr).with_filters(ReceiverFilters {
            mapped_condition: vec!["6142004".to_string()],
            ..ReceiverFilters::default()
        }),
        Receiver::new("all-phd", "elr", Topic::FullElr),
    ]);
    let message = pipeline.ingest(&lab_bundle()).await;
    pipeline.destination.process(&message).await.unwrap();
    let delivered = pipeline.drain().await;
    assert_eq!(delivered.len(), 2);

    for out in &delivered {
        let bytes = pipeline.blob.download(&out.blob_url).await.unwrap();
        let bundle: Bundle = serde_json::from_slice(&bytes).unwrap();
        match out.receiver_full_name.as_str() {
            "flu-registry.elr" => {
                assert_eq!(bundle.observations().count(), 1);
                assert!(bundle.entry("Observation/flu").is_some());
                assert!(bundle.entry("Observation/covid").is_none());
                // Specimen survives through the kept observation.
                assert!(bundle.entry("Specimen/s1").is_some());
            }
            "all-phd.elr" => {
                assert_eq!(bundle.observations().count(), 2);
            }
            other => panic!("unexpected receiver {other}"),
        }
    }
}

#[tokio::test]
async fn whole_pipeline_rerun_changes_nothing() {
    let pipeline = Pipeline::new(vec![Receiver::new("ca-phd", "elr", Topic::FullElr)]);
    let message = pipeline.ingest(&lab_bundle()).await;

    pipeline.destination.process(&message).await.unwrap();
    let first = pipeline.drain().await;
    let edges_after_first = pipeline.lineage.edges().await.len();

    pipeline.destination.process(&message).await.unwrap();
    let second = pipeline.drain().await;

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].report_id, second[0].report_id);
    assert_eq!(first[0].blob_url, second[0].blob_url);
    assert_eq!(pipeline.lineage.edges().await.len(), edges_after_first);
}
