//! The matching engine: graph lifecycle plus the `analyze` and
//! `predict` operations exposed to the HTTP layer.
//!
//! The knowledge graph and the matcher catalog are built together from
//! one store snapshot and cached behind an `Arc`. Readers clone the
//! `Arc` and never block; a rebuild constructs the new state off to the
//! side and swaps it in atomically, so in-flight requests finish
//! against the snapshot they started with. A failed rebuild leaves the
//! previous state serving.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use thiserror::Error;

use incimatch_graph::{KnowledgeGraph, NodeKey};
use incimatch_matcher::{aggregate_confidence, build_catalog, density_multiplier, match_query};
use incimatch_model::{AnalyzeResponse, CatalogEntry, PredictResponse, Prediction};
use incimatch_normalize::NormalizedQuery;
use incimatch_rank::{rank, HeuristicScorer, Scorer};
use incimatch_store::{load_snapshot, DocumentStore, StoreError};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Graph and catalog built from one store snapshot.
struct EngineState {
    graph: KnowledgeGraph,
    catalog: Vec<CatalogEntry>,
}

/// Size summary of the cached state, for health and warm-up output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub catalog_entries: usize,
}

/// The matching engine.
///
/// Generic over the document store and the injected scorer; without a
/// scorer the ranking path uses the overlap heuristic.
pub struct Engine<St, Sc = HeuristicScorer> {
    store: St,
    scorer: Option<Sc>,
    state: RwLock<Option<Arc<EngineState>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl<St: DocumentStore + Sync> Engine<St, HeuristicScorer> {
    /// Create an engine that ranks with the built-in heuristic.
    pub fn new(store: St) -> Self {
        Self {
            store,
            scorer: None,
            state: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl<St, Sc> Engine<St, Sc>
where
    St: DocumentStore + Sync,
    Sc: Scorer + Sync,
{
    /// Create an engine that ranks with an injected scorer.
    pub fn with_scorer(store: St, scorer: Sc) -> Self {
        Self {
            store,
            scorer: Some(scorer),
            state: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Build (or rebuild with `force`) the cached graph and catalog.
    ///
    /// Rebuilds are serialized; a concurrent trigger waits and then
    /// observes the fresh state instead of duplicating the work.
    pub async fn rebuild_graph(&self, force: bool) -> Result<EngineStats, EngineError> {
        let state = self.state_handle(force).await?;
        Ok(EngineStats {
            graph_nodes: state.graph.node_count(),
            graph_edges: state.graph.edge_count(),
            catalog_entries: state.catalog.len(),
        })
    }

    async fn state_handle(&self, force: bool) -> Result<Arc<EngineState>, EngineError> {
        if !force {
            if let Some(state) = self.cached_state() {
                return Ok(state);
            }
        }

        let _rebuild = self.rebuild_lock.lock().await;
        // Another trigger may have built while we waited for the lock.
        if !force {
            if let Some(state) = self.cached_state() {
                return Ok(state);
            }
        }

        let snapshot = load_snapshot(&self.store).await?;
        let state = Arc::new(EngineState {
            graph: KnowledgeGraph::build(&snapshot),
            catalog: build_catalog(&snapshot),
        });

        *self.state.write().expect("engine state lock poisoned") = Some(state.clone());
        tracing::info!(
            nodes = state.graph.node_count(),
            edges = state.graph.edge_count(),
            catalog = state.catalog.len(),
            "engine state rebuilt"
        );

        Ok(state)
    }

    fn cached_state(&self) -> Option<Arc<EngineState>> {
        self.state.read().expect("engine state lock poisoned").clone()
    }

    /// Match an INCI list against the branded catalog.
    ///
    /// An empty or entirely-unmatchable list is a valid result, not an
    /// error.
    pub async fn analyze(&self, inci_names: &[String]) -> Result<AnalyzeResponse, EngineError> {
        let start = Instant::now();
        let query = NormalizedQuery::from_raw(inci_names);
        let state = self.state_handle(false).await?;

        let outcome = match_query(&query, &state.catalog);
        let multiplier = density_multiplier(&query, &outcome.matched);
        let overall = aggregate_confidence(&outcome.matched, multiplier);

        Ok(AnalyzeResponse {
            matched: outcome.matched,
            unmatched: outcome.unmatched,
            conflicts: outcome.conflicts,
            overall_confidence: overall,
            processing_time_seconds: round3(start.elapsed().as_secs_f64()),
        })
    }

    /// Predict likely branded blends for an INCI list via graph
    /// retrieval and ranking.
    pub async fn predict(
        &self,
        inci_names: &[String],
        top_k: usize,
    ) -> Result<PredictResponse, EngineError> {
        let query = NormalizedQuery::from_raw(inci_names);
        let state = self.state_handle(false).await?;

        let mut nodes: Vec<NodeKey> = Vec::new();
        let mut matched_inci = Vec::new();
        let mut unmatched = Vec::new();

        for (key, display) in query.keys().iter().zip(query.display()) {
            match state.graph.ingredient_by_name(key) {
                Some(node) => {
                    let name = state
                        .graph
                        .node(node)
                        .map(|data| data.name.clone())
                        .unwrap_or_else(|| display.clone());
                    matched_inci.push(name);
                    nodes.push(node.clone());
                }
                None => unmatched.push(display.clone()),
            }
        }

        if nodes.is_empty() {
            return Ok(PredictResponse {
                predictions: Vec::new(),
                matched_inci,
                unmatched,
            });
        }

        let candidates = state.graph.branded_candidates(&nodes);
        let ranked = rank(&state.graph, &nodes, candidates, top_k, self.scorer.as_ref()).await;

        let predictions = ranked
            .into_iter()
            .map(|candidate| Prediction {
                name: state.graph.node(&candidate.node).map(|data| data.name.clone()),
                branded_id: candidate.node.id,
                score: candidate.score,
                features: candidate.features,
            })
            .collect();

        Ok(PredictResponse {
            predictions,
            matched_inci,
            unmatched,
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use incimatch_store::{Collection, MemoryStore};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn seeded_store() -> MemoryStore {
        MemoryStore::new()
            .with_collection(
                Collection::Incis,
                vec![
                    json!({"_id": "i1", "inciName": "Aqua"}),
                    json!({"_id": "i2", "inciName": "Glycerin"}),
                    json!({"_id": "i3", "inciName": "Phenoxyethanol"}),
                    json!({"_id": "i4", "inciName": "Niacinamide"}),
                ],
            )
            .with_collection(
                Collection::BrandedIngredients,
                vec![
                    json!({
                        "_id": "b1",
                        "ingredient_name": "Hydrasoft",
                        "inci_ids": ["i1", "i2"],
                        "supplier_id": "s1"
                    }),
                    json!({
                        "_id": "b2",
                        "ingredient_name": "Glowplex",
                        "inci_ids": ["i4"]
                    }),
                ],
            )
            .with_collection(
                Collection::Suppliers,
                vec![json!({"_id": "s1", "supplierName": "Acme Actives"})],
            )
    }

    fn names(raws: &[&str]) -> Vec<String> {
        raws.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_analyze_scenario() {
        let engine = Engine::new(seeded_store());
        let response = engine
            .analyze(&names(&["Aqua", "Glycerin", "Phenoxyethanol"]))
            .await
            .unwrap();

        assert_eq!(response.matched.len(), 1);
        assert_eq!(response.matched[0].product_name, "Hydrasoft");
        assert_eq!(response.matched[0].supplier.as_deref(), Some("Acme Actives"));
        // proximity 0.667 (positions 0..1 of 3) times rarity 0.85
        assert_eq!(response.matched[0].confidence, 0.567);
        assert_eq!(response.unmatched, vec!["Phenoxyethanol".to_string()]);
        // density 1/3 maps to multiplier 0.8; 0.567 * 0.8 rounds to 0.454
        assert_eq!(response.overall_confidence, 0.454);
        assert!(response.overall_confidence >= 0.0 && response.overall_confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_analyze_empty_query() {
        let engine = Engine::new(seeded_store());
        let response = engine.analyze(&[]).await.unwrap();

        assert!(response.matched.is_empty());
        assert!(response.unmatched.is_empty());
        assert_eq!(response.overall_confidence, 0.0);
    }

    #[tokio::test]
    async fn test_analyze_unmatchable_query() {
        let engine = Engine::new(seeded_store());
        let response = engine
            .analyze(&names(&["Squalane", "Tocopherol"]))
            .await
            .unwrap();

        assert!(response.matched.is_empty());
        assert_eq!(
            response.unmatched,
            vec!["Squalane".to_string(), "Tocopherol".to_string()]
        );
        assert_eq!(response.overall_confidence, 0.0);
    }

    #[tokio::test]
    async fn test_predict() {
        let engine = Engine::new(seeded_store());
        let response = engine
            .predict(&names(&["Aqua", "Glycerin", "Squalane"]), 10)
            .await
            .unwrap();

        assert_eq!(response.matched_inci, vec!["Aqua", "Glycerin"]);
        assert_eq!(response.unmatched, vec!["Squalane".to_string()]);
        assert_eq!(response.predictions.len(), 1);
        assert_eq!(response.predictions[0].branded_id, "b1");
        assert_eq!(response.predictions[0].name.as_deref(), Some("Hydrasoft"));
        assert_eq!(response.predictions[0].score, 1.0);
        assert_eq!(response.predictions[0].features.overlap_count, 2);
    }

    #[tokio::test]
    async fn test_predict_nothing_resolvable() {
        let engine = Engine::new(seeded_store());
        let response = engine.predict(&names(&["Squalane"]), 10).await.unwrap();

        assert!(response.predictions.is_empty());
        assert!(response.matched_inci.is_empty());
        assert_eq!(response.unmatched, vec!["Squalane".to_string()]);
    }

    /// A store that can be switched to fail, for rebuild-failure tests.
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl DocumentStore for FlakyStore {
        async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable);
            }
            self.inner.find_all(collection).await
        }

        async fn find_many(
            &self,
            collection: Collection,
            field: &str,
            value: &str,
        ) -> Result<Vec<Value>, StoreError> {
            self.inner.find_many(collection, field, value).await
        }

        async fn find_one(
            &self,
            collection: Collection,
            field: &str,
            value: &str,
        ) -> Result<Option<Value>, StoreError> {
            self.inner.find_one(collection, field, value).await
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failed_rebuild_serves_stale_state() {
        let store = FlakyStore {
            inner: seeded_store(),
            failing: AtomicBool::new(false),
        };
        let engine = Engine::new(store);

        let stats = engine.rebuild_graph(false).await.unwrap();
        assert!(stats.graph_nodes > 0);

        engine.store().failing.store(true, Ordering::SeqCst);

        // forced rebuild fails...
        assert!(engine.rebuild_graph(true).await.is_err());

        // ...but the cached state still serves
        let response = engine.analyze(&names(&["Aqua", "Glycerin"])).await.unwrap();
        assert_eq!(response.matched.len(), 1);
    }

    #[tokio::test]
    async fn test_first_call_builds_once() {
        let engine = Engine::new(seeded_store());
        let first = engine.rebuild_graph(false).await.unwrap();
        let second = engine.rebuild_graph(false).await.unwrap();
        assert_eq!(first, second);
    }
}
