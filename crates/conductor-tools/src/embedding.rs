use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};
use std::collections::BTreeMap;

/// Computes text embeddings for discovery queries and catalog descriptors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for one text.
    async fn embed(&self, text: &str) -> ConductorResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Feature-hashing bag-of-words embedding that needs no external service.
///
/// Each word longer than one character is hashed (FNV-1a) into two slots of a
/// fixed-size vector weighted by its term frequency, and the result is L2
/// normalized. Identical texts always produce identical vectors.
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    /// Embedder producing vectors of `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> ConductorResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ConductorError::ToolDiscovery(
                "cannot embed empty text".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let mut freq: BTreeMap<&str, f32> = BTreeMap::new();
        let mut total = 0.0f32;
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
        {
            *freq.entry(word).or_insert(0.0) += 1.0;
            total += 1.0;
        }

        let mut vector = vec![0.0f32; self.dimension];
        if total == 0.0 {
            return Ok(vector);
        }

        for (word, count) in &freq {
            let tf = count / total;
            let primary = fnv1a(word.as_bytes(), 0) as usize % self.dimension;
            let secondary = fnv1a(word.as_bytes(), 1) as usize % self.dimension;
            vector[primary] += tf;
            vector[secondary] += tf * 0.5;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a over `bytes` followed by a one-byte salt.
fn fnv1a(bytes: &[u8], salt: u8) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes.iter().chain(std::iter::once(&salt)) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Cosine similarity of two vectors. Mismatched lengths or a zero vector give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
