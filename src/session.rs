//! # Session
//!
//! Explicit per-session state for the map-and-search pipeline.
//!
//! A [`Session`] owns the store connection and the encoder, and caches one
//! [`Prepared`] map (corpus + fitted layout) per [`FetchKey`]. Fetching and
//! fitting happen once per key; every later query reuses the cached layout, so
//! corpus points keep their positions between renders.
//!
//! ```text
//!   prepare(key) ──► cache hit? ──yes──► Rc<Prepared>
//!                        │no
//!                        ▼
//!       store.fetch ──► empty? ──► EmptyCorpus
//!                        │
//!       check encoder D == corpus D
//!                        │
//!       layout::fit ──► cache ──► Rc<Prepared>
//!
//!   search(key, text) ──► blank? ──► BlankQuery   (no encoder call)
//!        encode ──► project + nearest ──► QueryResult
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::corpus::Corpus;
use crate::encoder::TextEncoder;
use crate::error::AtlasError;
use crate::layout::{self, Layout, LayoutParams};
use crate::neighbors;
use crate::vector_store::ArticleStore;

/// Cache key: the parameters a corpus was fetched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub limit: Option<usize>,
}

impl FetchKey {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }
}

/// A fetched corpus and the layout fitted to it.
#[derive(Debug)]
pub struct Prepared {
    pub corpus: Corpus,
    pub layout: Layout,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl Prepared {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}

/// A highlighted neighbour of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Position in the corpus.
    pub index: usize,
    pub title: String,
    /// Euclidean distance in embedding space.
    pub distance: f32,
    /// Fitted 2D point of the neighbour.
    pub point: [f32; 2],
}

/// Everything shown for one submitted query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Query projected into the fitted 2D space.
    pub point: [f32; 2],
    /// Nearest first.
    pub neighbors: Vec<Neighbor>,
}

/// Store + encoder + per-key cache for one interactive session.
pub struct Session<E: TextEncoder> {
    store: ArticleStore,
    encoder: E,
    params: LayoutParams,
    cache: HashMap<FetchKey, Rc<Prepared>>,
}

impl<E: TextEncoder> Session<E> {
    pub fn new(store: ArticleStore, encoder: E, params: LayoutParams) -> Self {
        Self {
            store,
            encoder,
            params,
            cache: HashMap::new(),
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Number of cached maps.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Fetch and fit the corpus for `key`, or return the cached result.
    ///
    /// # Errors
    /// - [`AtlasError::EmptyCorpus`] if the store has no rows; nothing is fitted.
    /// - [`AtlasError::DimensionMismatch`] if the stored vectors are ragged or
    ///   were produced by an encoder of a different dimensionality.
    /// - [`AtlasError::InsufficientData`] for a single-row corpus.
    /// - Store errors from [`ArticleStore::fetch`].
    pub fn prepare(&mut self, key: FetchKey) -> Result<Rc<Prepared>, AtlasError> {
        if let Some(hit) = self.cache.get(&key) {
            debug!(?key, "layout cache hit");
            return Ok(Rc::clone(hit));
        }

        let corpus = self.store.fetch(key.limit)?;
        let Some(dimension) = corpus.dimension()? else {
            warn!("store returned no articles");
            return Err(AtlasError::EmptyCorpus);
        };

        if dimension != self.encoder.dimension() {
            return Err(AtlasError::DimensionMismatch {
                expected: self.encoder.dimension(),
                found: dimension,
            });
        }

        let vectors = corpus.vectors();
        let layout = layout::fit(&vectors, &self.params)?;
        info!(?key, articles = corpus.len(), dimension, "map prepared");

        let prepared = Rc::new(Prepared {
            corpus,
            layout,
            vectors,
            dimension,
        });
        self.cache.insert(key, Rc::clone(&prepared));
        Ok(prepared)
    }

    /// Encode `text`, place it on the map for `key` and find its `k` nearest articles.
    ///
    /// # Errors
    /// - [`AtlasError::BlankQuery`] for empty or whitespace-only text. The
    ///   encoder and store are not touched.
    /// - Anything [`Session::prepare`] returns.
    /// - [`AtlasError::InvalidNeighborCount`] if `k == 0`.
    pub fn search(&mut self, key: FetchKey, text: &str, k: usize) -> Result<QueryResult, AtlasError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AtlasError::BlankQuery);
        }

        let prepared = self.prepare(key)?;
        let embedding = self.encoder.encode(text)?;
        let point = prepared.layout.transform.project(&embedding)?;

        let neighbors = neighbors::nearest(prepared.vectors(), &embedding, k)?
            .into_iter()
            .map(|hit| Neighbor {
                index: hit.index,
                title: prepared.corpus.articles()[hit.index].title.clone(),
                distance: hit.distance,
                point: prepared.layout.points[hit.index],
            })
            .collect();

        Ok(QueryResult {
            text: text.to_string(),
            embedding,
            point,
            neighbors,
        })
    }
}
