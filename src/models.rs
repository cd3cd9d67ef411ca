//! # Database models
//!
//! Row types for the `articles` table (see `crate::schema`).
//!
//! Embeddings are stored as text in the pgvector literal form `[0.1,0.2,...]`,
//! which keeps the table readable from any SQLite shell and matches what
//! pgvector-backed exports produce. [`crate::vector_store`] converts between
//! that text and `Vec<f32>`.
//!
//! ```no_run
//! use diesel::prelude::*;
//! use embedding_atlas::models::ArticleRow;
//! use embedding_atlas::schema::articles;
//!
//! # fn demo(conn: &mut SqliteConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let row: ArticleRow = diesel::insert_into(articles::table)
//!     .values(&ArticleRow { id: None, title: "Hello".into(), title_vector: "[1,0]".into() })
//!     .returning(ArticleRow::as_returning())
//!     .get_result(conn)?;
//! assert!(row.id.is_some());
//! # Ok(()) }
//! ```
use diesel::prelude::*;

/// One stored article.
///
/// ### Table
/// - `articles`
///
/// ### Notes
/// - `id` is optional for `Insertable` convenience; SQLite assigns it on insert.
/// - `title_vector` is the raw vector literal; parse it with
///   [`crate::vector_store::parse_vector`].
#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleRow {
    /// Auto-increment primary key (set by the DB on insert).
    #[diesel(deserialize_as = i32)]
    pub id: Option<i32>,
    pub title: String,
    /// Embedding of `title` as `[v1,v2,...]`.
    pub title_vector: String,
}
