/// Which side of an embedding request this is — the corpus being indexed,
/// or a search query against it. Some providers (e.g. Jina) embed these
/// differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPhase {
    Query,
    Document,
}

/// Seam between `EventStore` and whatever computes embeddings — in
/// production, `memoria-llm`'s gateway. Kept as a trait so this crate never
/// depends on the HTTP/LLM stack.
#[async_trait::async_trait]
pub trait EventEmbedder: Send + Sync {
    async fn embed(&self, text: &str, phase: EmbedPhase) -> Result<Vec<f32>, String>;
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for a
/// zero-length or zero-norm vector rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
