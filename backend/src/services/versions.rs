//! Version snapshot manager
//!
//! Captures a note's (title, content) before each text-affecting write and
//! lets callers browse and restore earlier snapshots. Restoring snapshots the
//! current state first, so a restore can itself be undone.

use crate::config;
use crate::database::{Note, NoteVersion, Repository, VersionBrief};
use crate::error::{AppError, Result};
use crate::services::links::LinksService;
use crate::timestamp;
use sqlx::SqliteConnection;

/// Service for note version history
#[derive(Clone)]
pub struct VersionsService {
    repo: Repository,
}

impl VersionsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Record the note's current title and content as a new version
    pub async fn snapshot(conn: &mut SqliteConnection, note: &Note) -> Result<NoteVersion> {
        Repository::insert_version(conn, &note.id, &note.title, &note.content).await
    }

    /// Most recent versions, newest first, without content
    pub async fn list_versions(&self, note_id: &str) -> Result<Vec<VersionBrief>> {
        let mut conn = self.repo.acquire().await?;
        Repository::fetch_note(&mut conn, note_id).await?;
        Repository::list_versions(&mut conn, note_id, config::VERSION_LIST_LIMIT).await
    }

    /// Full snapshot, provided it belongs to `note_id`
    pub async fn get_version(&self, note_id: &str, version_id: &str) -> Result<NoteVersion> {
        let mut conn = self.repo.acquire().await?;
        Repository::find_version(&mut conn, note_id, version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Version {}", version_id)))
    }

    /// Overwrite the note's title and content from an earlier version
    pub async fn restore_version(&self, note_id: &str, version_id: &str) -> Result<Note> {
        tracing::info!("Restoring note {} to version {}", note_id, version_id);

        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, note_id).await?;
        let version = Repository::find_version(&mut tx, note_id, version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Version {}", version_id)))?;

        Self::snapshot(&mut tx, &note).await?;

        note.title = version.title;
        note.content = version.content;
        note.updated_at = timestamp::now();
        Repository::save_note(&mut tx, &note).await?;

        LinksService::sync_links(&mut tx, &note.id, &note.content).await?;

        tx.commit().await?;

        tracing::info!("Note {} restored to version {}", note_id, version_id);
        Ok(note)
    }
}
