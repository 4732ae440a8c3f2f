//! Candidate scoring and ranking.
//!
//! Provides the `Scorer` trait with two implementations: the built-in
//! overlap heuristic and an adapter for an externally-trained scoring
//! service. Ranking never fails on a scorer problem; it falls back to
//! the heuristic and still returns a result.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use incimatch_graph::{KnowledgeGraph, NodeKey};
use incimatch_model::FeatureVector;

/// Errors from scorer invocations.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Scoring request failed: {0}")]
    Request(String),

    #[error("Malformed scorer response: {0}")]
    Malformed(String),

    #[error("Scorer returned {got} scores for {expected} candidates")]
    LengthMismatch { expected: usize, got: usize },
}

/// Trait for candidate scorers (heuristic, remote model, etc.)
///
/// A scorer maps a feature batch to one probability-like score per
/// candidate, same length and same order. Must be safe to call with a
/// single element.
pub trait Scorer {
    fn score(
        &self,
        batch: &[FeatureVector],
    ) -> impl Future<Output = Result<Vec<f64>, ScorerError>> + Send;

    /// Scorer name for logging.
    fn name(&self) -> &'static str;
}

/// Overlap score for one candidate: the fraction of its constituents
/// present in the query.
pub fn heuristic_score(features: &FeatureVector) -> f64 {
    f64::from(features.overlap_count) / f64::from(features.branded_inci_total.max(1))
}

/// Built-in graph-overlap scorer; always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl Scorer for HeuristicScorer {
    async fn score(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ScorerError> {
        Ok(batch.iter().map(heuristic_score).collect())
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Remote scoring service configuration.
#[derive(Debug, Clone)]
pub struct RemoteScorerConfig {
    /// Base URL for the scoring service HTTP API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteScorerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8501".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize)]
struct ScoreRequest {
    features: Vec<[f64; 5]>,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: Vec<f64>,
}

/// Adapter for an externally-trained scoring service.
pub struct RemoteScorer {
    config: RemoteScorerConfig,
    client: reqwest::Client,
}

impl RemoteScorer {
    /// Create a new remote scorer.
    pub fn new(config: RemoteScorerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }
}

impl Scorer for RemoteScorer {
    async fn score(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ScorerError> {
        let request = ScoreRequest {
            features: batch.iter().map(FeatureVector::as_array).collect(),
        };

        let response = self
            .client
            .post(format!("{}/score", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ScorerError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScorerError::Request(format!("HTTP {}", response.status())));
        }

        let parsed: ScoreResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::Malformed(e.to_string()))?;

        if parsed.scores.len() != batch.len() {
            return Err(ScorerError::LengthMismatch {
                expected: batch.len(),
                got: parsed.scores.len(),
            });
        }

        Ok(parsed.scores)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// A scored candidate with its feature metadata.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub node: NodeKey,
    pub score: f64,
    pub features: FeatureVector,
}

/// Score and order candidates, descending, truncated to `top_k`.
///
/// Without a scorer the overlap heuristic applies. A scorer error (or a
/// response of the wrong length) is logged and the whole batch falls
/// back to the heuristic; ranking itself never fails. Ties break on
/// candidate id so output is deterministic across runs.
pub async fn rank<S: Scorer + Sync>(
    graph: &KnowledgeGraph,
    query_nodes: &[NodeKey],
    candidates: Vec<NodeKey>,
    top_k: usize,
    scorer: Option<&S>,
) -> Vec<RankedCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let vectors: Vec<FeatureVector> = candidates
        .iter()
        .map(|candidate| graph.feature_vector(query_nodes, candidate))
        .collect();

    let scores = match scorer {
        Some(scorer) => match scorer.score(&vectors).await {
            Ok(scores) if scores.len() == vectors.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    scorer = scorer.name(),
                    expected = vectors.len(),
                    got = scores.len(),
                    "scorer batch length mismatch, falling back to overlap heuristic"
                );
                vectors.iter().map(heuristic_score).collect()
            }
            Err(error) => {
                tracing::warn!(
                    scorer = scorer.name(),
                    %error,
                    "scorer failed, falling back to overlap heuristic"
                );
                vectors.iter().map(heuristic_score).collect()
            }
        },
        None => vectors.iter().map(heuristic_score).collect(),
    };

    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .zip(vectors)
        .zip(scores)
        .map(|((node, features), score)| RankedCandidate {
            node,
            score,
            features,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    ranked.truncate(top_k);

    ranked
}
