//! Version snapshot storage. Rows are append-only.

use super::models::{NoteVersion, VersionBrief};
use super::repository::Repository;
use crate::error::Result;
use crate::ids::new_id;
use crate::timestamp;
use sqlx::SqliteConnection;

impl Repository {
    pub async fn insert_version(
        conn: &mut SqliteConnection,
        note_id: &str,
        title: &str,
        content: &str,
    ) -> Result<NoteVersion> {
        let version = sqlx::query_as::<_, NoteVersion>(
            r#"
            INSERT INTO note_versions (id, note_id, title, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(note_id)
        .bind(title)
        .bind(content)
        .bind(timestamp::format(&timestamp::now()))
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!("Captured version {} of note {}", version.id, note_id);
        Ok(version)
    }

    /// Newest-first version briefs, capped at `limit`
    pub async fn list_versions(
        conn: &mut SqliteConnection,
        note_id: &str,
        limit: i64,
    ) -> Result<Vec<VersionBrief>> {
        let versions = sqlx::query_as::<_, VersionBrief>(
            r#"
            SELECT id, title, created_at FROM note_versions
            WHERE note_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(note_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(versions)
    }

    /// Version `version_id`, only if it belongs to `note_id`
    pub async fn find_version(
        conn: &mut SqliteConnection,
        note_id: &str,
        version_id: &str,
    ) -> Result<Option<NoteVersion>> {
        let version = sqlx::query_as::<_, NoteVersion>(
            "SELECT * FROM note_versions WHERE id = ? AND note_id = ?",
        )
        .bind(version_id)
        .bind(note_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(version)
    }

    pub async fn count_versions(conn: &mut SqliteConnection, note_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM note_versions WHERE note_id = ?")
            .bind(note_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}
