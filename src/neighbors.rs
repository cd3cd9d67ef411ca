//! # Neighbor finder
//!
//! Exact k-nearest-neighbour search under Euclidean distance.
//!
//! This is a brute-force scan, O(n·D) per query. The corpus is capped at a few
//! thousand rows and queries arrive one at a time from a human, so an ANN index
//! would only add build cost and approximation error.
//!
//! ```rust
//! use embedding_atlas::neighbors::nearest;
//!
//! let corpus = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![10.0, 10.0]];
//! let hits = nearest(&corpus, &[1.0, 1.0], 2).unwrap();
//! let ids: Vec<usize> = hits.iter().map(|h| h.index).collect();
//! assert_eq!(ids, vec![0, 1]);
//! ```

use crate::error::AtlasError;

/// One search hit: a position in the corpus and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub distance: f32,
}

/// Euclidean distance between two equal-length vectors.
///
/// Callers check lengths; extra trailing elements of the longer slice are ignored.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_distance(a, b).sqrt()
}

/// Squared Euclidean distance.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Return up to `k` corpus positions nearest to `query`, nearest first.
///
/// - Returns `min(k, corpus.len())` hits; asking for more than the corpus holds
///   returns all of it in distance order.
/// - Equal distances keep corpus order.
///
/// # Errors
/// - [`AtlasError::InvalidNeighborCount`] if `k == 0`.
/// - [`AtlasError::DimensionMismatch`] if any corpus vector differs in length
///   from `query`.
pub fn nearest(corpus: &[Vec<f32>], query: &[f32], k: usize) -> Result<Vec<Hit>, AtlasError> {
    if k == 0 {
        return Err(AtlasError::InvalidNeighborCount(k));
    }

    let mut hits = Vec::with_capacity(corpus.len());
    for (index, vector) in corpus.iter().enumerate() {
        if vector.len() != query.len() {
            return Err(AtlasError::DimensionMismatch {
                expected: vector.len(),
                found: query.len(),
            });
        }
        hits.push(Hit {
            index,
            distance: euclidean_distance(vector, query),
        });
    }

    // sort_by is stable, so ties stay in corpus order
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(k);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vec<Vec<f32>> {
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![10.0, 10.0]]
    }

    fn indices(hits: &[Hit]) -> Vec<usize> {
        hits.iter().map(|h| h.index).collect()
    }

    #[test]
    fn test_two_nearest_in_order() {
        let hits = nearest(&abc(), &[1.0, 1.0], 2).unwrap();
        assert_eq!(indices(&hits), vec![0, 1]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_corpus() {
        let hits = nearest(&abc(), &[1.0, 1.0], 10).unwrap();
        assert_eq!(indices(&hits), vec![0, 1, 2]);
    }

    #[test]
    fn test_distances_non_decreasing() {
        let corpus: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                let t = i as f32 * 0.37;
                vec![t.sin() * 3.0, t.cos() * 2.0, (t * 0.5).sin()]
            })
            .collect();
        let query = [0.3, -0.4, 0.1];
        for k in [1, 5, 17, 50, 80] {
            let hits = nearest(&corpus, &query, k).unwrap();
            assert_eq!(hits.len(), k.min(corpus.len()));
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let corpus = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, -1.0]];
        let hits = nearest(&corpus, &[0.0, 0.0], 4).unwrap();
        assert_eq!(indices(&hits), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(
            nearest(&abc(), &[1.0, 1.0], 0),
            Err(AtlasError::InvalidNeighborCount(0))
        ));
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        assert!(matches!(
            nearest(&abc(), &[1.0, 1.0, 1.0], 1),
            Err(AtlasError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        assert!(nearest(&[], &[1.0], 3).unwrap().is_empty());
    }
}
