use crate::catalog::Catalog;
use crate::descriptor::ToolDescriptor;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Tuning knobs of the discovery index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Results returned when the caller does not ask for a specific count.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum number of hubs kept before spoke expansion (`m` is the larger of this and `k`).
    #[serde(default = "default_hub_candidates")]
    pub hub_candidates: usize,
    /// Subtracted from a hub's similarity to score its spokes.
    #[serde(default = "default_hop_penalty")]
    pub hop_penalty: f32,
    /// Hubs scoring below this cosine similarity are discarded.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

fn default_top_k() -> usize {
    3
}

fn default_hub_candidates() -> usize {
    5
}

fn default_hop_penalty() -> f32 {
    0.1
}

fn default_min_similarity() -> f32 {
    0.1
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            hub_candidates: default_hub_candidates(),
            hop_penalty: default_hop_penalty(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl DiscoveryConfig {
    /// Reject a zero `top_k`, a negative or non-finite hop penalty, and a
    /// similarity floor outside [-1, 1].
    pub fn validate(&self) -> ConductorResult<()> {
        if self.top_k == 0 {
            return Err(ConductorError::Config("discovery.top_k must be at least 1".into()));
        }
        if !(self.hop_penalty.is_finite() && self.hop_penalty >= 0.0) {
            return Err(ConductorError::Config(
                "discovery.hop_penalty must be a non-negative number".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(ConductorError::Config(
                "discovery.min_similarity must be within [-1, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// One ranked discovery result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMatch {
    /// The matched tool.
    pub descriptor: ToolDescriptor,
    /// Ranking score; spokes carry the hop penalty.
    pub score: f32,
    /// 0 for a hub, 1 for a spoke reached through a dependency edge.
    pub hops: u8,
    /// The hub a spoke was reached from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

impl ToolMatch {
    /// Id of the matched tool.
    pub fn tool_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Whether the match was reached through a hub.
    pub fn is_spoke(&self) -> bool {
        self.hops > 0
    }
}

struct Candidate<'a> {
    descriptor: &'a ToolDescriptor,
    score: f32,
    hops: u8,
    via: Option<&'a str>,
}

/// Hub & spoke retrieval over an immutable catalog.
///
/// Shared read-only by all workers; queries never mutate the index.
pub struct DiscoveryIndex {
    catalog: Arc<Catalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: DiscoveryConfig,
}

impl DiscoveryIndex {
    /// Build an index over `catalog`, embedding queries with `embedder`.
    pub fn new(
        catalog: Arc<Catalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            config,
        }
    }

    /// The catalog being searched.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Ranking parameters.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Rank catalog tools for a free-text query.
    ///
    /// Returns at most `k` matches, best first. Fails with a tool-discovery
    /// error when no in-scope tool reaches the similarity threshold.
    pub async fn query(
        &self,
        text: &str,
        domain_filter: Option<&str>,
        k: usize,
    ) -> ConductorResult<Vec<ToolMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if text.trim().is_empty() {
            return Err(ConductorError::ToolDiscovery("empty discovery query".into()));
        }
        let embedding = self.embedder.embed(text).await?;
        let matches = self.rank(&embedding, domain_filter, k)?;
        debug!(
            query = text,
            domain = domain_filter.unwrap_or("*"),
            results = matches.len(),
            "Discovery query"
        );
        Ok(matches)
    }

    /// Rank catalog tools against an already computed query embedding.
    pub fn rank(
        &self,
        query_embedding: &[f32],
        domain_filter: Option<&str>,
        k: usize,
    ) -> ConductorResult<Vec<ToolMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.catalog.dimension() {
            if dim != query_embedding.len() {
                return Err(ConductorError::Catalog(format!(
                    "query embedding has dimension {}, catalog uses {dim}",
                    query_embedding.len()
                )));
            }
        }

        let in_scope =
            |d: &ToolDescriptor| domain_filter.map_or(true, |domain| d.domain == domain);

        // Hub search.
        let mut hubs: Vec<(&ToolDescriptor, f32)> = self
            .catalog
            .iter()
            .filter(|d| in_scope(d) && !d.embedding.is_empty())
            .map(|d| (d, cosine_similarity(query_embedding, &d.embedding)))
            .filter(|(_, sim)| *sim >= self.config.min_similarity)
            .collect();

        if hubs.is_empty() {
            let scope = domain_filter
                .map(|d| format!(" in domain '{d}'"))
                .unwrap_or_default();
            return Err(ConductorError::ToolDiscovery(format!(
                "no tool{scope} reached similarity {:.2}",
                self.config.min_similarity
            )));
        }

        hubs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        hubs.truncate(self.config.hub_candidates.max(k));

        let mut best: BTreeMap<&str, Candidate<'_>> = BTreeMap::new();
        for &(hub, sim) in &hubs {
            offer(
                &mut best,
                Candidate {
                    descriptor: hub,
                    score: sim,
                    hops: 0,
                    via: None,
                },
            );
        }

        // One-hop spoke expansion.
        for &(hub, sim) in &hubs {
            for dep_id in &hub.dependencies {
                let Some(dep) = self.catalog.get(dep_id) else {
                    continue;
                };
                if !in_scope(dep) {
                    continue;
                }
                offer(
                    &mut best,
                    Candidate {
                        descriptor: dep,
                        score: sim - self.config.hop_penalty,
                        hops: 1,
                        via: Some(hub.id.as_str()),
                    },
                );
            }
        }

        let mut ranked: Vec<Candidate<'_>> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|c| ToolMatch {
                descriptor: c.descriptor.clone(),
                score: c.score,
                hops: c.hops,
                via: c.via.map(str::to_string),
            })
            .collect())
    }
}

/// Keep the best-scoring occurrence of each tool; ties prefer fewer hops.
fn offer<'a>(best: &mut BTreeMap<&'a str, Candidate<'a>>, candidate: Candidate<'a>) {
    let id = candidate.descriptor.id.as_str();
    match best.get(id) {
        Some(existing)
            if existing.score > candidate.score
                || (existing.score == candidate.score && existing.hops <= candidate.hops) => {}
        _ => {
            best.insert(id, candidate);
        }
    }
}
