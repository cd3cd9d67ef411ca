//! # Corpus
//!
//! The in-memory table of articles a session maps and searches.
//!
//! A [`Corpus`] is loaded once from the store and never mutated afterwards;
//! layout points and neighbour indices refer back into it by position.

use crate::error::AtlasError;

/// A single stored document: its title and the embedding of that title.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub embedding: Vec<f32>,
}

impl Article {
    pub fn new(title: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            title: title.into(),
            embedding,
        }
    }
}

/// Ordered, immutable sequence of [`Article`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    articles: Vec<Article>,
}

impl Corpus {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn get(&self, index: usize) -> Option<&Article> {
        self.articles.get(index)
    }

    /// Titles in corpus order.
    pub fn titles(&self) -> Vec<&str> {
        self.articles.iter().map(|a| a.title.as_str()).collect()
    }

    /// Embedding vectors in corpus order.
    pub fn vectors(&self) -> Vec<Vec<f32>> {
        self.articles.iter().map(|a| a.embedding.clone()).collect()
    }

    /// The shared dimensionality of every embedding.
    ///
    /// Returns `Ok(None)` for an empty corpus.
    ///
    /// # Errors
    /// [`AtlasError::DimensionMismatch`] if any embedding differs in length
    /// from the first one.
    pub fn dimension(&self) -> Result<Option<usize>, AtlasError> {
        let Some(first) = self.articles.first() else {
            return Ok(None);
        };
        let expected = first.embedding.len();
        for article in &self.articles[1..] {
            if article.embedding.len() != expected {
                return Err(AtlasError::DimensionMismatch {
                    expected,
                    found: article.embedding.len(),
                });
            }
        }
        Ok(Some(expected))
    }
}

impl FromIterator<Article> for Corpus {
    fn from_iter<I: IntoIterator<Item = Article>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_uniform() {
        let corpus: Corpus = vec![
            Article::new("A", vec![1.0, 0.0]),
            Article::new("B", vec![0.0, 1.0]),
        ]
        .into_iter()
        .collect();
        assert_eq!(corpus.dimension().unwrap(), Some(2));
        assert_eq!(corpus.titles(), vec!["A", "B"]);
    }

    #[test]
    fn test_dimension_empty() {
        assert_eq!(Corpus::default().dimension().unwrap(), None);
    }

    #[test]
    fn test_dimension_ragged() {
        let corpus = Corpus::new(vec![
            Article::new("A", vec![1.0, 0.0]),
            Article::new("B", vec![0.0, 1.0, 2.0]),
        ]);
        assert!(matches!(
            corpus.dimension(),
            Err(AtlasError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }
}
