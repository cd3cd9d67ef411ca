//! # VectorStore
//!
//! Read and write access to the `articles` table.
//!
//! The map only ever needs one read: every `(title, title_vector)` row, or a
//! random sample of them. [`ArticleStore::fetch`] does that and hands back an
//! in-memory [`Corpus`]. The write side (schema creation, inserts, vector
//! rewrites) backs the `init`, `ingest` and `reembed` commands.
//!
//! ## Sampling
//! `fetch(Some(n))` uses `ORDER BY RANDOM() LIMIT n`. Repeated calls return
//! different rows; callers that need a stable view cache the result (see
//! [`crate::session::Session`]).
//!
//! ## Failure modes
//! - missing database file or failed connection → [`AtlasError::StoreUnreachable`]
//! - zero rows → an empty [`Corpus`], not an error
//! - unparsable vector text → [`AtlasError::MalformedVector`]
//!
//! ```no_run
//! use embedding_atlas::vector_store::ArticleStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = ArticleStore::open("atlas.db")?;
//! let corpus = store.fetch(Some(500))?;
//! println!("{} articles", corpus.len());
//! # Ok(()) }
//! ```

use std::path::Path;

use diesel::prelude::*;
use diesel::{Connection, SqliteConnection};
use tracing::{debug, info};

use crate::corpus::{Article, Corpus};
use crate::error::AtlasError;
use crate::models::ArticleRow;
use crate::schema::articles;

diesel::define_sql_function!(fn random() -> diesel::sql_types::Integer);

const CREATE_ARTICLES: &str = "CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    title TEXT NOT NULL,
    title_vector TEXT NOT NULL
)";

/// Connection to the article database.
pub struct ArticleStore {
    conn: SqliteConnection,
    url: String,
}

impl ArticleStore {
    /// Open an existing database.
    ///
    /// SQLite would silently create a missing file; a missing file is treated
    /// as an unreachable store instead.
    ///
    /// # Errors
    /// [`AtlasError::StoreUnreachable`] if the file does not exist or the
    /// connection fails.
    pub fn open(database_url: &str) -> Result<Self, AtlasError> {
        if !is_in_memory(database_url) && !Path::new(database_url).exists() {
            return Err(AtlasError::StoreUnreachable {
                url: database_url.to_string(),
                reason: "database file does not exist".to_string(),
            });
        }
        Self::connect(database_url)
    }

    /// Open or create a database and make sure the `articles` table exists.
    pub fn create(database_url: &str) -> Result<Self, AtlasError> {
        let mut store = Self::connect(database_url)?;
        store.ensure_schema()?;
        Ok(store)
    }

    fn connect(database_url: &str) -> Result<Self, AtlasError> {
        let conn = SqliteConnection::establish(database_url).map_err(|e| {
            AtlasError::StoreUnreachable {
                url: database_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!("connected to {}", database_url);
        Ok(Self {
            conn,
            url: database_url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Create the `articles` table if it is missing.
    pub fn ensure_schema(&mut self) -> Result<(), AtlasError> {
        diesel::sql_query(CREATE_ARTICLES).execute(&mut self.conn)?;
        Ok(())
    }

    /// Load articles, optionally as a random sample of at most `limit` rows.
    ///
    /// Without a limit all rows are returned in id order.
    ///
    /// # Errors
    /// [`AtlasError::InvalidSampleSize`] for `Some(0)`.
    pub fn fetch(&mut self, limit: Option<usize>) -> Result<Corpus, AtlasError> {
        let rows: Vec<ArticleRow> = match limit {
            Some(0) => return Err(AtlasError::InvalidSampleSize(0)),
            Some(n) => articles::table
                .select(ArticleRow::as_select())
                .order(random())
                .limit(i64::try_from(n).unwrap_or(i64::MAX))
                .load(&mut self.conn)?,
            None => articles::table
                .select(ArticleRow::as_select())
                .order(articles::id)
                .load(&mut self.conn)?,
        };
        info!(rows = rows.len(), ?limit, "fetched articles");

        rows.into_iter()
            .map(|row| {
                let embedding = parse_vector(&row.title_vector).map_err(|reason| {
                    AtlasError::MalformedVector {
                        title: row.title.clone(),
                        reason,
                    }
                })?;
                Ok(Article::new(row.title, embedding))
            })
            .collect::<Result<Vec<_>, AtlasError>>()
            .map(Corpus::new)
    }

    /// Dimension of the stored vectors, taken from the first article.
    ///
    /// `None` for an empty table.
    pub fn dimension(&mut self) -> Result<Option<usize>, AtlasError> {
        let first: Option<ArticleRow> = articles::table
            .select(ArticleRow::as_select())
            .order(articles::id)
            .first(&mut self.conn)
            .optional()?;
        first
            .map(|row| {
                parse_vector(&row.title_vector)
                    .map(|v| v.len())
                    .map_err(|reason| AtlasError::MalformedVector {
                        title: row.title,
                        reason,
                    })
            })
            .transpose()
    }

    /// Number of stored articles.
    pub fn count(&mut self) -> Result<i64, AtlasError> {
        Ok(articles::table.count().get_result(&mut self.conn)?)
    }

    /// `(id, title)` of every article, in id order.
    pub fn titles(&mut self) -> Result<Vec<(i32, String)>, AtlasError> {
        Ok(articles::table
            .select((articles::id, articles::title))
            .order(articles::id)
            .load(&mut self.conn)?)
    }

    /// Insert one article and return its id.
    pub fn insert_article(&mut self, title: &str, vector: &[f32]) -> Result<i32, AtlasError> {
        let row = ArticleRow {
            id: None,
            title: title.to_string(),
            title_vector: format_vector(vector),
        };
        let id: i32 = diesel::insert_into(articles::table)
            .values(&row)
            .returning(articles::id)
            .get_result(&mut self.conn)?;
        Ok(id)
    }

    /// Insert many articles in a single transaction and return their ids.
    ///
    /// Either every row is stored or none is.
    pub fn insert_articles(&mut self, rows: &[(String, Vec<f32>)]) -> Result<Vec<i32>, AtlasError> {
        let ids = self
            .conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                rows.iter()
                    .map(|(title, vector)| {
                        diesel::insert_into(articles::table)
                            .values(&ArticleRow {
                                id: None,
                                title: title.clone(),
                                title_vector: format_vector(vector),
                            })
                            .returning(articles::id)
                            .get_result::<i32>(conn)
                    })
                    .collect()
            })?;
        Ok(ids)
    }

    /// Rewrite the vectors of many articles in a single transaction.
    ///
    /// `on_row` is called after each update with the number done so far.
    pub fn update_vectors<F>(
        &mut self,
        updates: &[(i32, Vec<f32>)],
        mut on_row: F,
    ) -> Result<usize, AtlasError>
    where
        F: FnMut(usize),
    {
        let updated = self
            .conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                let mut done = 0;
                for (id, vector) in updates {
                    done += diesel::update(articles::table.find(*id))
                        .set(articles::title_vector.eq(format_vector(vector)))
                        .execute(conn)?;
                    on_row(done);
                }
                Ok(done)
            })?;
        Ok(updated)
    }
}

/// In-memory and URI-style databases have no plain file path to check.
fn is_in_memory(url: &str) -> bool {
    url == ":memory:" || url.starts_with("file:")
}

/// Parse a pgvector-style literal such as `[1, 2.5, -3e-2]`.
pub fn parse_vector(text: &str) -> Result<Vec<f32>, String> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("expected [..], got {:?}", truncate(text)))?;

    if inner.trim().is_empty() {
        return Err("empty vector".to_string());
    }

    inner
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| format!("bad component {:?}: {e}", v.trim()))
        })
        .collect()
}

/// Format a vector as a pgvector-style literal.
pub fn format_vector(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn truncate(text: &str) -> String {
    text.chars().take(32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded_store(rows: &[(&str, &[f32])]) -> ArticleStore {
        let mut store = ArticleStore::create(":memory:").unwrap();
        for (title, v) in rows {
            store.insert_article(title, v).unwrap();
        }
        store
    }

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("[1,2,3]").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_vector(" [0.5, -1e-1] ").unwrap(), vec![0.5, -0.1]);
        assert!(parse_vector("1,2,3").is_err());
        assert!(parse_vector("[]").is_err());
        assert!(parse_vector("[1,x]").is_err());
    }

    #[test]
    fn test_format_vector_parses_back() {
        let v = vec![0.25, -3.5, 1e-7];
        assert_eq!(parse_vector(&format_vector(&v)).unwrap(), v);
    }

    #[test]
    fn test_fetch_empty_store() {
        let mut store = seeded_store(&[]);
        let corpus = store.fetch(None).unwrap();
        assert!(corpus.is_empty());
        assert!(store.fetch(Some(10)).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_all_in_id_order() {
        let mut store = seeded_store(&[
            ("A", &[1.0, 0.0]),
            ("B", &[0.0, 1.0]),
            ("C", &[10.0, 10.0]),
        ]);
        let corpus = store.fetch(None).unwrap();
        assert_eq!(corpus.titles(), vec!["A", "B", "C"]);
        assert_eq!(corpus.get(2).unwrap().embedding, vec![10.0, 10.0]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_fetch_sample_is_bounded() {
        let rows: Vec<(String, Vec<f32>)> = (0..20)
            .map(|i| (format!("t{i}"), vec![i as f32, 1.0]))
            .collect();
        let mut store = ArticleStore::create(":memory:").unwrap();
        for (t, v) in &rows {
            store.insert_article(t, v).unwrap();
        }
        let sample = store.fetch(Some(5)).unwrap();
        assert_eq!(sample.len(), 5);
        let titles = sample.titles();
        assert!(titles.iter().all(|t| t.starts_with('t')));

        let all = store.fetch(Some(100)).unwrap();
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_fetch_rejects_zero_sample() {
        let mut store = seeded_store(&[("A", &[1.0, 0.0]), ("B", &[0.0, 1.0])]);
        let err = store.fetch(Some(0)).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidSampleSize(0)));
        assert_eq!(store.fetch(Some(usize::MAX)).unwrap().len(), 2);
    }

    #[test]
    fn test_dimension_from_first_row() {
        let mut store = seeded_store(&[]);
        assert_eq!(store.dimension().unwrap(), None);
        store.insert_article("A", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(store.dimension().unwrap(), Some(3));
    }

    #[test]
    fn test_insert_articles_is_all_or_nothing() {
        let mut store = seeded_store(&[("A", &[1.0, 0.0])]);
        let rows = vec![("B".to_string(), vec![0.0, 1.0]), ("C".to_string(), vec![2.0, 2.0])];
        let ids = store.insert_articles(&rows).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
        assert_eq!(store.fetch(None).unwrap().titles(), vec!["A", "B", "C"]);

        diesel::sql_query("CREATE TRIGGER no_d BEFORE INSERT ON articles WHEN NEW.title = 'D' BEGIN SELECT RAISE(ABORT, 'no D'); END")
            .execute(&mut store.conn)
            .unwrap();
        let rows = vec![("E".to_string(), vec![1.0, 1.0]), ("D".to_string(), vec![1.0, 1.0])];
        assert!(store.insert_articles(&rows).is_err());
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_malformed_vector_reported() {
        let mut store = seeded_store(&[]);
        diesel::sql_query("INSERT INTO articles (title, title_vector) VALUES ('bad', 'nope')")
            .execute(&mut store.conn)
            .unwrap();
        let err = store.fetch(None).unwrap_err();
        assert!(matches!(err, AtlasError::MalformedVector { ref title, .. } if title == "bad"));
    }

    #[test]
    fn test_open_missing_file_is_unreachable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let err = ArticleStore::open(path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, AtlasError::StoreUnreachable { .. }));
    }

    #[test]
    fn test_create_then_open_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let url = path.to_str().unwrap();
        {
            let mut store = ArticleStore::create(url).unwrap();
            store.insert_article("A", &[1.0, 2.0]).unwrap();
        }
        let mut store = ArticleStore::open(url).unwrap();
        assert_eq!(store.fetch(None).unwrap().len(), 1);
    }

    #[test]
    fn test_update_vectors() {
        let mut store = seeded_store(&[("A", &[1.0, 0.0]), ("B", &[0.0, 1.0])]);
        let ids: Vec<i32> = store.titles().unwrap().into_iter().map(|(id, _)| id).collect();
        let updates: Vec<(i32, Vec<f32>)> = ids.iter().map(|id| (*id, vec![9.0, 9.0, 9.0])).collect();

        let mut seen = Vec::new();
        let n = store.update_vectors(&updates, |done| seen.push(done)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![1, 2]);
        let corpus = store.fetch(None).unwrap();
        assert_eq!(corpus.dimension().unwrap(), Some(3));
    }
}
