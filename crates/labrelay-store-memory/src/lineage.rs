use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use labrelay_core::id::{LineageAction, LineageEdge, ReportId};
use labrelay_store::{LineageStore, StoreError};

#[derive(Debug, Default)]
struct LineageState {
    /// Dedup set keyed by (parent, child, action): re-recording is a no-op.
    keys: HashSet<(ReportId, ReportId, LineageAction)>,
    edges: Vec<LineageEdge>,
    children: HashMap<ReportId, Vec<ReportId>>,
}

/// Append-only lineage store over an adjacency map. Single-edge inserts, no
/// cross-edge locking; queries may observe a partial fan-out and callers are
/// expected to poll.
#[derive(Debug, Clone, Default)]
pub struct MemoryLineageStore {
    state: Arc<RwLock<LineageState>>,
}

impl MemoryLineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded edges, in insertion order. For test assertions.
    pub async fn edges(&self) -> Vec<LineageEdge> {
        self.state.read().await.edges.clone()
    }

    /// Direct children of [`parent`].
    pub async fn children(&self, parent: ReportId) -> Vec<ReportId> {
        let state = self.state.read().await;
        state.children.get(&parent).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LineageStore for MemoryLineageStore {
    async fn record_edge(&self, edge: LineageEdge) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.keys.insert((edge.parent, edge.child, edge.action)) {
            return Ok(());
        }
        state
            .children
            .entry(edge.parent)
            .or_default()
            .push(edge.child);
        state.edges.push(edge);
        Ok(())
    }

    async fn descendants(&self, root: ReportId) -> Result<Vec<ReportId>, StoreError> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut frontier = VecDeque::from([root]);
        while let Some(id) = frontier.pop_front() {
            if let Some(children) = state.children.get(&id) {
                for &child in children {
                    if seen.insert(child) {
                        out.push(child);
                        frontier.push_back(child);
                    }
                }
            }
        }
        Ok(out)
    }

    async fn count_by_action(
        &self,
        root: ReportId,
        action: LineageAction,
        receiver_full_name: Option<&str>,
    ) -> Result<usize, StoreError> {
        let below: HashSet<ReportId> = self.descendants(root).await?.into_iter().collect();
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|edge| edge.action == action)
            .filter(|edge| edge.parent == root || below.contains(&edge.parent))
            .filter(|edge| match receiver_full_name {
                Some(name) => edge.receiver_full_name.as_deref() == Some(name),
                None => true,
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let store = MemoryLineageStore::new();
        let parent = ReportId::new();
        let child = ReportId::new();
        let edge = LineageEdge::new(parent, child, LineageAction::DestinationFilter);
        store.record_edge(edge.clone()).await.unwrap();
        store.record_edge(edge).await.unwrap();
        assert_eq!(store.edges().await.len(), 1);
        assert_eq!(store.children(parent).await, vec![child]);
    }

    #[tokio::test]
    async fn test_descendants_are_transitive() {
        let store = MemoryLineageStore::new();
        let root = ReportId::new();
        let mid = ReportId::new();
        let leaf = ReportId::new();
        store
            .record_edge(LineageEdge::new(root, mid, LineageAction::DestinationFilter))
            .await
            .unwrap();
        store
            .record_edge(LineageEdge::new(mid, leaf, LineageAction::Translate))
            .await
            .unwrap();
        let descendants = store.descendants(root).await.unwrap();
        assert_eq!(descendants.len(), 2);
        assert!(descendants.contains(&mid));
        assert!(descendants.contains(&leaf));
    }

    #[tokio::test]
    async fn test_count_by_action_with_receiver_filter() {
        let store = MemoryLineageStore::new();
        let root = ReportId::new();
        let a = ReportId::new();
        let b = ReportId::new();
        store
            .record_edge(
                LineageEdge::new(root, a, LineageAction::Translate).for_receiver("ca-phd.elr"),
            )
            .await
            .unwrap();
        store
            .record_edge(
                LineageEdge::new(root, b, LineageAction::Translate).for_receiver("wa-phd.elr"),
            )
            .await
            .unwrap();
        let all = store
            .count_by_action(root, LineageAction::Translate, None)
            .await
            .unwrap();
        assert_eq!(all, 2);
        let one = store
            .count_by_action(root, LineageAction::Translate, Some("ca-phd.elr"))
            .await
            .unwrap();
        assert_eq!(one, 1);
        let none = store
            .count_by_action(root, LineageAction::ReceiverFilter, None)
            .await
            .unwrap();
        assert_eq!(none, 0);
    }
}
