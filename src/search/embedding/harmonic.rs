//! Harmonic token projection embeddings.
//!
//! Training-free and deterministic: every token is read as a base-2^16
//! integer, reduced modulo a set of coprime moduli, and each residue is
//! placed on the unit circle. Token vectors are mean-pooled and
//! L2-normalized. Texts that share tokens land close together; there is no
//! notion of meaning beyond that.

use std::f64::consts::PI;

use super::Embedder;
use crate::error::EmbeddingError;

/// Two components (sin, cos) per modulus.
pub const EMBEDDING_DIM: usize = 384;

const MAX_TOKEN_CHARS: usize = 64;

pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
    id: String,
}

impl HarmonicEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(EMBEDDING_DIM / 2),
            id: format!("harmonic:d{}", EMBEDDING_DIM),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut pooled = vec![0.0f64; EMBEDDING_DIM];
        if tokens.is_empty() {
            return vec![0.0; EMBEDDING_DIM];
        }

        for token in &tokens {
            let n = token_to_integer(token);
            for (i, &m) in self.moduli.iter().enumerate() {
                let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
                pooled[2 * i] += theta.sin();
                pooled[2 * i + 1] += theta.cos();
            }
        }

        let count = tokens.len() as f64;
        pooled.iter_mut().for_each(|v| *v /= count);

        let norm = pooled.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            pooled.iter().map(|x| (x / norm) as f32).collect()
        } else {
            pooled.iter().map(|x| *x as f32).collect()
        }
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HarmonicEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// N = Σ u_j · 2^(16·(L-j)), wrapping on overflow.
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_CHARS)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_across_instances() {
        let a = HarmonicEmbedder::new().embed_text("validate the bearer token");
        let b = HarmonicEmbedder::new().embed_text("validate the bearer token");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_unit_norm() {
        let v = HarmonicEmbedder::new().embed_text("refund an invoice");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shared_tokens_score_higher() {
        let model = HarmonicEmbedder::new();
        let query = model.embed_text("token bucket rate limiter");
        let related = model.embed_text("the rate limiter refills its token bucket");
        let unrelated = model.embed_text("invoice totals include sales tax");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HarmonicEmbedder::new().embed_text("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(6), vec![2, 3, 5, 7, 11, 13]);
        assert_eq!(*first_primes(192).last().unwrap(), 1163);
    }
}
