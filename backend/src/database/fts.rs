//! Full-text index queries. The index itself is written only by the
//! triggers installed in the initial migration.

use super::repository::Repository;
use crate::config;
use crate::error::Result;
use sqlx::{FromRow, SqliteConnection};

/// Raw FTS hit; `bm25_rank` is BM25, lower is better
#[derive(Debug, Clone, FromRow)]
pub struct SearchRow {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub folder_id: Option<String>,
    pub folder_name: Option<String>,
    pub bm25_rank: f64,
}

impl Repository {
    /// Run an FTS5 MATCH expression over live notes
    pub async fn search_index(
        conn: &mut SqliteConnection,
        match_expr: &str,
        limit: u32,
    ) -> std::result::Result<Vec<SearchRow>, sqlx::Error> {
        sqlx::query_as::<_, SearchRow>(
            r#"
            SELECT
                n.id,
                n.title,
                snippet(notes_fts, 1, ?, ?, ?, ?) AS snippet,
                n.folder_id,
                f.name AS folder_name,
                bm25(notes_fts, ?, ?) AS bm25_rank
            FROM notes_fts
            JOIN notes n ON n.rowid = notes_fts.rowid
            LEFT JOIN folders f ON f.id = n.folder_id
            WHERE notes_fts MATCH ?
              AND n.is_trashed = 0
            ORDER BY bm25_rank ASC
            LIMIT ?
            "#,
        )
        .bind(config::HIGHLIGHT_OPEN)
        .bind(config::HIGHLIGHT_CLOSE)
        .bind(config::SNIPPET_ELLIPSIS)
        .bind(config::SNIPPET_TOKENS)
        .bind(config::TITLE_WEIGHT)
        .bind(config::CONTENT_WEIGHT)
        .bind(match_expr)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
    }

    /// Number of index rows matching an expression, trashed notes included
    pub async fn index_match_count(conn: &mut SqliteConnection, match_expr: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM notes_fts WHERE notes_fts MATCH ?")
            .bind(match_expr)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}
