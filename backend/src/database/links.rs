//! Link table access. Rows are a cache of each note's resolvable
//! wiki-links and are only written by the link resolver.

use super::models::{GraphNode, LinkedNote, NoteLink};
use super::repository::Repository;
use crate::error::Result;
use sqlx::SqliteConnection;

impl Repository {
    pub async fn delete_outgoing_links(conn: &mut SqliteConnection, source_id: &str) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM note_links WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows)
    }

    pub async fn insert_link(conn: &mut SqliteConnection, source_id: &str, target_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO note_links (source_id, target_id) VALUES (?, ?)")
            .bind(source_id)
            .bind(target_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Id of the live note titled exactly `title`.
    ///
    /// Titles are not unique; the earliest created note wins.
    pub async fn resolve_title(conn: &mut SqliteConnection, title: &str) -> Result<Option<String>> {
        let id = sqlx::query_scalar(
            r#"
            SELECT id FROM notes
            WHERE title = ? AND is_trashed = 0
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(title)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Target ids of a note's outgoing links, sorted
    pub async fn outgoing_link_ids(conn: &mut SqliteConnection, source_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT target_id FROM note_links WHERE source_id = ? ORDER BY target_id ASC",
        )
        .bind(source_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ids)
    }

    pub async fn outgoing_notes(conn: &mut SqliteConnection, source_id: &str) -> Result<Vec<LinkedNote>> {
        let notes = sqlx::query_as::<_, LinkedNote>(
            r#"
            SELECT n.id, n.title, n.updated_at FROM notes n
            JOIN note_links l ON l.target_id = n.id
            WHERE l.source_id = ? AND n.is_trashed = 0
            ORDER BY n.title ASC
            "#,
        )
        .bind(source_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(notes)
    }

    /// Live notes linking to `target_id`, most recently updated first
    pub async fn backlinks(conn: &mut SqliteConnection, target_id: &str) -> Result<Vec<LinkedNote>> {
        let notes = sqlx::query_as::<_, LinkedNote>(
            r#"
            SELECT n.id, n.title, n.updated_at FROM notes n
            JOIN note_links l ON l.source_id = n.id
            WHERE l.target_id = ? AND n.is_trashed = 0
            ORDER BY n.updated_at DESC
            "#,
        )
        .bind(target_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(notes)
    }

    /// Every link whose endpoints are both live notes
    pub async fn live_links(conn: &mut SqliteConnection) -> Result<Vec<NoteLink>> {
        let links = sqlx::query_as::<_, NoteLink>(
            r#"
            SELECT l.source_id, l.target_id FROM note_links l
            JOIN notes s ON s.id = l.source_id AND s.is_trashed = 0
            JOIN notes t ON t.id = l.target_id AND t.is_trashed = 0
            ORDER BY l.source_id, l.target_id
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(links)
    }

    /// (note_id, tag_id) pairs for live notes
    pub async fn live_note_tag_pairs(conn: &mut SqliteConnection) -> Result<Vec<(String, String)>> {
        let pairs = sqlx::query_as(
            r#"
            SELECT nt.note_id, nt.tag_id FROM note_tags nt
            JOIN notes n ON n.id = nt.note_id
            WHERE n.is_trashed = 0
            ORDER BY nt.tag_id, nt.note_id
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(pairs)
    }

    /// Every live note as a graph vertex, oldest first
    pub async fn graph_nodes(conn: &mut SqliteConnection) -> Result<Vec<GraphNode>> {
        let nodes = sqlx::query_as::<_, GraphNode>(
            "SELECT id, title, folder_id FROM notes WHERE is_trashed = 0 ORDER BY created_at, id",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(nodes)
    }
}
