//! # Errors
//!
//! One error type for the whole map-and-search pipeline.
//!
//! | Kind | Variants | What the caller does |
//! |------|----------|----------------------|
//! | Store | `StoreUnreachable`, `Query`, `MalformedVector` | Blocking error, user retries |
//! | Data | `EmptyCorpus`, `InsufficientData` | Warning, pipeline stops before layout |
//! | Shape | `DimensionMismatch`, `InvalidNeighborCount` | Fix encoder/corpus pairing or input |
//! | Input | `BlankQuery` | Warn, no backend call is made |
//! | Infra | `Encoder`, `Io`, `Config` | Blocking error |
//!
//! Nothing in the crate retries. Every failure ends the current user action.

use thiserror::Error;

/// Every way the pipeline can fail.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// The database could not be opened or connected to.
    #[error("vector store unreachable at {url}: {reason}")]
    StoreUnreachable { url: String, reason: String },

    /// A query against an open store failed.
    #[error("store query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// A stored vector literal could not be parsed.
    #[error("malformed vector for {title:?}: {reason}")]
    MalformedVector { title: String, reason: String },

    /// The store returned zero rows.
    #[error("no articles found in the store")]
    EmptyCorpus,

    /// Too few vectors to fit a layout.
    #[error("insufficient data: need at least {needed} vectors, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Two vectors that must share an embedding space do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// `k` must be positive.
    #[error("neighbour count must be positive, got {0}")]
    InvalidNeighborCount(usize),

    /// A random sample must hold at least one article.
    #[error("sample size must be positive, got {0}")]
    InvalidSampleSize(usize),

    /// The query text was empty or whitespace.
    #[error("query text is blank")]
    BlankQuery,

    /// The sentence encoder failed to load or run.
    #[error("encoder error: {0}")]
    Encoder(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl AtlasError {
    /// `true` for conditions shown to the user as a warning rather than a failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, AtlasError::EmptyCorpus | AtlasError::BlankQuery)
    }
}

impl From<candle_core::Error> for AtlasError {
    fn from(e: candle_core::Error) -> Self {
        AtlasError::Encoder(e.to_string())
    }
}

impl From<serde_yaml::Error> for AtlasError {
    fn from(e: serde_yaml::Error) -> Self {
        AtlasError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_classification() {
        assert!(AtlasError::EmptyCorpus.is_warning());
        assert!(AtlasError::BlankQuery.is_warning());
        assert!(!AtlasError::InsufficientData { needed: 2, got: 1 }.is_warning());
        assert!(!AtlasError::InvalidSampleSize(0).is_warning());
        assert!(
            !AtlasError::StoreUnreachable {
                url: "x.db".into(),
                reason: "missing".into()
            }
            .is_warning()
        );
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let e = AtlasError::DimensionMismatch {
            expected: 384,
            found: 1024,
        };
        assert_eq!(e.to_string(), "dimension mismatch: expected 384, found 1024");
    }
}
