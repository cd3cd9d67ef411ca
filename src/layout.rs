//! # Layout engine
//!
//! Reduces D-dimensional embeddings to a stable 2D layout with UMAP
//! (Uniform Manifold Approximation and Projection), Euclidean metric.
//!
//! The reduction is split in two so the map never moves under the user:
//!
//! - [`fit`] builds the fuzzy k-NN graph of the corpus, optimises a 2D
//!   embedding of it and returns a [`Layout`]: one point per input vector plus
//!   the fitted [`UmapTransform`].
//! - [`UmapTransform::project`] places a *new* vector (the query) into that
//!   same 2D space without touching the fitted points.
//!
//! ## Pipeline
//! ```text
//!  vectors ──► exact kNN graph ──► smooth kNN (rho, sigma) ──► fuzzy union
//!                                                                  │
//!       points ◄── SGD with negative sampling ◄── seeded init ◄────┘
//! ```
//!
//! Everything is driven by a single seed, so fitting the same vectors with the
//! same [`LayoutParams`] twice gives bit-identical points.
//!
//! ```rust
//! use embedding_atlas::layout::{fit, LayoutParams};
//!
//! let vectors: Vec<Vec<f32>> = (0..12)
//!     .map(|i| vec![i as f32, (i % 3) as f32, (i % 4) as f32])
//!     .collect();
//! let layout = fit(&vectors, &LayoutParams::default()).unwrap();
//! assert_eq!(layout.points.len(), 12);
//!
//! let p = layout.transform.project(&[5.5, 1.0, 2.0]).unwrap();
//! assert!(p[0].is_finite() && p[1].is_finite());
//! ```

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AtlasError;
use crate::neighbors::{euclidean_distance, nearest};

const SMOOTH_K_TOLERANCE: f32 = 1e-5;
const MIN_K_DIST_SCALE: f32 = 1e-3;
const BINARY_SEARCH_STEPS: usize = 64;
const GRADIENT_CLIP: f32 = 4.0;
const LARGE_CORPUS: usize = 10_000;

/// Tunables for [`fit`]. Serialized as the `layout:` block of the config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutParams {
    /// Size of the local neighbourhood, counting the point itself.
    pub n_neighbors: usize,
    /// Minimum spacing between points in the 2D layout.
    pub min_dist: f32,
    /// Scale of the embedded points.
    pub spread: f32,
    /// SGD epochs. `None` picks 500 for small corpora, 200 above 10k points.
    pub n_epochs: Option<usize>,
    pub learning_rate: f32,
    /// Negative samples drawn per positive edge sample.
    pub negative_sample_rate: usize,
    pub seed: u64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

/// Output of [`fit`]: the corpus points and the transform that made them.
#[derive(Debug, Clone)]
pub struct Layout {
    /// One 2D point per fitted vector, in input order.
    pub points: Vec<[f32; 2]>,
    pub transform: UmapTransform,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A fitted UMAP model.
///
/// Holds the training vectors and their 2D positions so new vectors from the
/// same embedding space can be projected with [`UmapTransform::project`].
#[derive(Debug, Clone)]
pub struct UmapTransform {
    data: Vec<Vec<f32>>,
    embedding: Vec<[f32; 2]>,
    dimension: usize,
    n_neighbors: usize,
    a: f32,
    b: f32,
    params: LayoutParams,
}

/// Fit a 2D layout to `vectors`.
///
/// # Errors
/// - [`AtlasError::InsufficientData`] for fewer than two vectors.
/// - [`AtlasError::DimensionMismatch`] if the vectors are not all the same length.
pub fn fit(vectors: &[Vec<f32>], params: &LayoutParams) -> Result<Layout, AtlasError> {
    let n = vectors.len();
    if n < 2 {
        return Err(AtlasError::InsufficientData { needed: 2, got: n });
    }
    let dimension = vectors[0].len();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(AtlasError::DimensionMismatch {
            expected: dimension,
            found: bad.len(),
        });
    }

    let n_neighbors = params.n_neighbors.max(2).min(n);
    let n_epochs = params
        .n_epochs
        .unwrap_or(if n <= LARGE_CORPUS { 500 } else { 200 })
        .max(1);
    let (a, b) = find_ab_params(params.spread, params.min_dist);
    info!(
        points = n,
        dimension, n_neighbors, n_epochs, a, b, "fitting 2D layout"
    );

    let (knn_indices, knn_dists) = knn_graph(vectors, n_neighbors);
    let edges = fuzzy_simplicial_set(&knn_indices, &knn_dists, n_neighbors);
    debug!(edges = edges.len(), "fuzzy graph built");

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut embedding: Vec<[f32; 2]> = (0..n)
        .map(|_| [rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0)])
        .collect();

    optimize_layout(
        &mut embedding,
        &edges,
        n_epochs,
        a,
        b,
        params.learning_rate,
        params.negative_sample_rate,
        &mut rng,
    );

    let transform = UmapTransform {
        data: vectors.to_vec(),
        embedding: embedding.clone(),
        dimension,
        n_neighbors,
        a,
        b,
        params: params.clone(),
    };

    Ok(Layout {
        points: embedding,
        transform,
    })
}

impl UmapTransform {
    /// Dimensionality of the vectors this transform was fit on.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors in the fit set.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fitted curve parameters `(a, b)`.
    pub fn curve(&self) -> (f32, f32) {
        (self.a, self.b)
    }

    /// Project an out-of-sample vector into the fitted 2D space.
    ///
    /// The fitted points are read-only here; only the new point moves. The RNG
    /// is re-seeded from the transform seed on every call, so the same input
    /// always lands on the same point. A vector identical to one in the fit set
    /// lands exactly on that vector's fitted point.
    ///
    /// # Errors
    /// [`AtlasError::DimensionMismatch`] if `vector` does not have the fitted D.
    pub fn project(&self, vector: &[f32]) -> Result<[f32; 2], AtlasError> {
        if vector.len() != self.dimension {
            return Err(AtlasError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }

        let hits = nearest(&self.data, vector, self.n_neighbors)?;
        if hits[0].distance <= f32::EPSILON {
            return Ok(self.embedding[hits[0].index]);
        }

        let dists: Vec<f32> = hits.iter().map(|h| h.distance).collect();
        let (sigma, rho) = smooth_knn_dist(&dists, hits.len() as f32, false, dists_mean(&dists));
        let weights: Vec<f32> = dists.iter().map(|d| membership(*d, rho, sigma)).collect();

        let total: f32 = weights.iter().sum();
        let mut point = [0.0f32; 2];
        for (hit, w) in hits.iter().zip(&weights) {
            let share = if total > 0.0 { w / total } else { 1.0 / hits.len() as f32 };
            let p = self.embedding[hit.index];
            point[0] += share * p[0];
            point[1] += share * p[1];
        }

        let n_epochs = match self.params.n_epochs {
            None if self.data.len() <= LARGE_CORPUS => 100,
            None => 30,
            Some(e) => (e / 3).max(1),
        };
        let max_w = weights.iter().copied().fold(0.0f32, f32::max);
        if max_w <= 0.0 {
            return Ok(point);
        }

        let edges: Vec<(usize, f32)> = hits
            .iter()
            .zip(&weights)
            .filter(|(_, w)| **w >= max_w / n_epochs as f32)
            .map(|(h, w)| (h.index, *w))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        refine_point(
            &mut point,
            &self.embedding,
            &edges,
            n_epochs,
            self.a,
            self.b,
            self.params.learning_rate,
            self.params.negative_sample_rate,
            &mut rng,
        );
        Ok(point)
    }
}

/// Exact k-NN of every vector against all others, self included at position 0.
fn knn_graph(data: &[Vec<f32>], k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f32>>) {
    data.par_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut candidates: Vec<(f32, usize)> = data
                .iter()
                .enumerate()
                .map(|(j, other)| (euclidean_distance(row, other), j))
                .collect();
            candidates.sort_by(|x, y| {
                x.0.total_cmp(&y.0)
                    .then_with(|| (x.1 != i).cmp(&(y.1 != i)))
                    .then(x.1.cmp(&y.1))
            });
            candidates.truncate(k);
            let (indices, dists): (Vec<usize>, Vec<f32>) =
                candidates.into_iter().map(|(d, j)| (j, d)).unzip();
            (indices, dists)
        })
        .unzip()
}

fn dists_mean(dists: &[f32]) -> f32 {
    if dists.is_empty() {
        0.0
    } else {
        dists.iter().sum::<f32>() / dists.len() as f32
    }
}

/// Per-point normalisation `(sigma, rho)` so the memberships of `dists` sum to `log2(k)`.
///
/// `dists` excludes the point itself. With `local_connectivity` set, `rho` is
/// the distance to the nearest non-identical neighbour; otherwise it is zero.
fn smooth_knn_dist(dists: &[f32], k: f32, local_connectivity: bool, global_mean: f32) -> (f32, f32) {
    let target = k.log2();

    let rho = if local_connectivity {
        dists.iter().copied().find(|d| *d > 0.0).unwrap_or(0.0)
    } else {
        0.0
    };

    let (mut lo, mut hi, mut mid) = (0.0f32, f32::INFINITY, 1.0f32);
    for _ in 0..BINARY_SEARCH_STEPS {
        let psum: f32 = dists
            .iter()
            .map(|d| {
                let d = d - rho;
                if d > 0.0 { (-d / mid).exp() } else { 1.0 }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let floor = if rho > 0.0 {
        MIN_K_DIST_SCALE * dists_mean(dists)
    } else {
        MIN_K_DIST_SCALE * global_mean
    };
    (mid.max(floor), rho)
}

fn membership(dist: f32, rho: f32, sigma: f32) -> f32 {
    if dist - rho <= 0.0 || sigma == 0.0 {
        1.0
    } else {
        (-(dist - rho) / sigma).exp()
    }
}

/// Symmetric fuzzy graph as a row-major edge list `(head, tail, weight)`.
fn fuzzy_simplicial_set(
    knn_indices: &[Vec<usize>],
    knn_dists: &[Vec<f32>],
    k: usize,
) -> Vec<(usize, usize, f32)> {
    let all: Vec<f32> = knn_dists.iter().flatten().copied().collect();
    let global_mean = dists_mean(&all);

    let mut directed: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (i, (indices, dists)) in knn_indices.iter().zip(knn_dists).enumerate() {
        let (sigma, rho) = smooth_knn_dist(&dists[1..], k as f32, true, global_mean);
        for (&j, &d) in indices.iter().zip(dists).skip(1) {
            if j == i {
                continue;
            }
            directed.insert((i, j), membership(d, rho, sigma));
        }
    }

    // probabilistic t-conorm: w = p + pᵀ - p∘pᵀ
    let mut union: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (&(i, j), &p) in &directed {
        let t = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let w = p + t - p * t;
        union.insert((i, j), w);
        union.insert((j, i), w);
    }

    union
        .into_iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|((i, j), w)| (i, j, w))
        .collect()
}

/// Schedule: an edge of weight `w` is sampled every `max_w / w` epochs.
fn epochs_per_sample(weights: &[f32]) -> Vec<f32> {
    let max_w = weights.iter().copied().fold(0.0f32, f32::max);
    weights.iter().map(|w| max_w / w).collect()
}

fn clip(v: f32) -> f32 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn attractive_coeff(d2: f32, a: f32, b: f32) -> f32 {
    if d2 > 0.0 {
        -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
    } else {
        0.0
    }
}

fn repulsive_coeff(d2: f32, a: f32, b: f32) -> f32 {
    2.0 * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0))
}

fn sq_dist2(p: [f32; 2], q: [f32; 2]) -> f32 {
    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)
}

#[allow(clippy::too_many_arguments)]
fn optimize_layout(
    embedding: &mut [[f32; 2]],
    edges: &[(usize, usize, f32)],
    n_epochs: usize,
    a: f32,
    b: f32,
    learning_rate: f32,
    negative_sample_rate: usize,
    rng: &mut StdRng,
) {
    let n = embedding.len();
    let max_w = edges.iter().map(|e| e.2).fold(0.0f32, f32::max);
    let edges: Vec<(usize, usize, f32)> = edges
        .iter()
        .copied()
        .filter(|e| e.2 >= max_w / n_epochs as f32)
        .collect();
    let weights: Vec<f32> = edges.iter().map(|e| e.2).collect();

    let eps = epochs_per_sample(&weights);
    let neg_rate = negative_sample_rate.max(1) as f32;
    let eps_neg: Vec<f32> = eps.iter().map(|e| e / neg_rate).collect();
    let mut next = eps.clone();
    let mut next_neg = eps_neg.clone();

    for epoch in 0..n_epochs {
        let alpha = learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
        let now = epoch as f32;

        for (e, &(j, k, _)) in edges.iter().enumerate() {
            if next[e] > now {
                continue;
            }

            let (current, other) = (embedding[j], embedding[k]);
            let coeff = attractive_coeff(sq_dist2(current, other), a, b);
            for d in 0..2 {
                let grad = clip(coeff * (current[d] - other[d]));
                embedding[j][d] += grad * alpha;
                embedding[k][d] -= grad * alpha;
            }
            next[e] += eps[e];

            let n_neg = ((now - next_neg[e]) / eps_neg[e]).floor().max(0.0) as usize;
            for _ in 0..n_neg {
                let k = rng.gen_range(0..n);
                let (current, other) = (embedding[j], embedding[k]);
                let d2 = sq_dist2(current, other);
                if d2 <= 0.0 && j == k {
                    continue;
                }
                let coeff = if d2 > 0.0 { repulsive_coeff(d2, a, b) } else { 0.0 };
                for d in 0..2 {
                    let grad = if coeff > 0.0 {
                        clip(coeff * (current[d] - other[d]))
                    } else {
                        GRADIENT_CLIP
                    };
                    embedding[j][d] += grad * alpha;
                }
            }
            next_neg[e] += n_neg as f32 * eps_neg[e];
        }
    }
}

/// Same SGD as [`optimize_layout`], but only `point` moves; `anchors` stay fixed.
#[allow(clippy::too_many_arguments)]
fn refine_point(
    point: &mut [f32; 2],
    anchors: &[[f32; 2]],
    edges: &[(usize, f32)],
    n_epochs: usize,
    a: f32,
    b: f32,
    learning_rate: f32,
    negative_sample_rate: usize,
    rng: &mut StdRng,
) {
    let weights: Vec<f32> = edges.iter().map(|e| e.1).collect();
    let eps = epochs_per_sample(&weights);
    let neg_rate = negative_sample_rate.max(1) as f32;
    let eps_neg: Vec<f32> = eps.iter().map(|e| e / neg_rate).collect();
    let mut next = eps.clone();
    let mut next_neg = eps_neg.clone();

    for epoch in 0..n_epochs {
        let alpha = learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
        let now = epoch as f32;

        for (e, &(k, _)) in edges.iter().enumerate() {
            if next[e] > now {
                continue;
            }

            let other = anchors[k];
            let coeff = attractive_coeff(sq_dist2(*point, other), a, b);
            let current = *point;
            for d in 0..2 {
                point[d] += clip(coeff * (current[d] - other[d])) * alpha;
            }
            next[e] += eps[e];

            let n_neg = ((now - next_neg[e]) / eps_neg[e]).floor().max(0.0) as usize;
            for _ in 0..n_neg {
                let other = anchors[rng.gen_range(0..anchors.len())];
                let current = *point;
                let d2 = sq_dist2(current, other);
                let coeff = if d2 > 0.0 { repulsive_coeff(d2, a, b) } else { 0.0 };
                for d in 0..2 {
                    let grad = if coeff > 0.0 {
                        clip(coeff * (current[d] - other[d]))
                    } else {
                        GRADIENT_CLIP
                    };
                    point[d] += grad * alpha;
                }
            }
            next_neg[e] += n_neg as f32 * eps_neg[e];
        }
    }
}

/// Fit `a`, `b` in `1 / (1 + a·x^(2b))` to the curve that is 1 below
/// `min_dist` and decays as `exp(-(x - min_dist) / spread)` above it.
///
/// Least squares over 300 samples on `[0, 3·spread]`, solved by a
/// shrinking grid search.
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let (spread, min_dist) = (spread as f64, min_dist as f64);
    let samples: Vec<(f64, f64)> = (0..300)
        .map(|i| {
            let x = spread * 3.0 * i as f64 / 299.0;
            let y = if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            };
            (x, y)
        })
        .collect();

    let loss = |a: f64, b: f64| -> f64 {
        samples
            .iter()
            .map(|(x, y)| {
                let f = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (f - y).powi(2)
            })
            .sum()
    };

    const STEPS: usize = 20;
    let (mut a_lo, mut a_hi) = (1e-3f64, 10.0f64);
    let (mut b_lo, mut b_hi) = (1e-2f64, 3.0f64);
    let (mut best_a, mut best_b) = (1.0, 1.0);

    for _ in 0..40 {
        let a_step = (a_hi - a_lo) / STEPS as f64;
        let b_step = (b_hi - b_lo) / STEPS as f64;
        let mut best = f64::INFINITY;
        for ia in 0..=STEPS {
            for ib in 0..=STEPS {
                let (a, b) = (a_lo + a_step * ia as f64, b_lo + b_step * ib as f64);
                let l = loss(a, b);
                if l < best {
                    best = l;
                    best_a = a;
                    best_b = b;
                }
            }
        }
        a_lo = (best_a - 2.0 * a_step).max(1e-6);
        a_hi = best_a + 2.0 * a_step;
        b_lo = (best_b - 2.0 * b_step).max(1e-6);
        b_hi = best_b + 2.0 * b_step;
    }

    (best_a as f32, best_b as f32)
}
