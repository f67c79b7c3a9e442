//! Notes service
//!
//! Note lifecycle and hierarchy. Every mutation validates first, then
//! writes the note row(s), the version snapshot and the post-conditions
//! from [`effects`](super::effects) in a single write transaction.
//! Subtasks are capped at one level: a note with a parent never has
//! subtasks of its own.

use crate::database::{
    CreateNoteRequest, Note, NoteDetail, NoteFilter, ReorderItem, Repository, Status,
    UpdateNoteRequest,
};
use crate::error::{AppError, Result};
use crate::ids::new_id;
use crate::services::effects;
use crate::services::versions::VersionsService;
use crate::timestamp;
use sqlx::types::Json;
use sqlx::SqliteConnection;

/// Result of completing a note
#[derive(Debug, Clone, serde::Serialize)]
pub struct Completion {
    pub note: Note,
    /// Successor created from the note's recurrence rule
    pub next_occurrence: Option<Note>,
}

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
}

impl NotesService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new note
    pub async fn create_note(&self, req: CreateNoteRequest) -> Result<Note> {
        tracing::info!("Creating new note: {}", req.title);

        if let Some(rule) = &req.recurrence_rule {
            rule.validate()?;
        }

        let mut tx = self.repo.begin_write().await?;

        let parent = match &req.parent_id {
            Some(parent_id) => Some(load_parent(&mut tx, parent_id).await?),
            None => None,
        };

        // Subtasks live in their parent's folder
        let folder_id = match &parent {
            Some(parent) => parent.folder_id.clone(),
            None => {
                if let Some(folder_id) = &req.folder_id {
                    ensure_folder(&mut tx, folder_id).await?;
                }
                req.folder_id.clone()
            }
        };

        if let Some(project_id) = &req.project_id {
            ensure_project(&mut tx, project_id).await?;
        }

        let mut note = Note::blank(new_id(), timestamp::now());
        note.title = req.title;
        note.content = req.content;
        note.folder_id = folder_id;
        note.note_type = req.note_type;
        note.parent_id = req.parent_id;
        note.status = req.status;
        note.project_id = req.project_id;
        note.recurrence_rule = req.recurrence_rule.map(Json);
        note.due_at = req.due_at;

        Repository::insert_note(&mut tx, &note).await?;
        effects::apply(&mut tx, effects::on_create(&note)).await?;

        tx.commit().await?;

        tracing::info!("Note created successfully: {}", note.id);

        Ok(note)
    }

    /// Get a note by ID, including trashed notes
    pub async fn get_note(&self, id: &str) -> Result<Note> {
        let mut conn = self.repo.acquire().await?;
        Repository::fetch_note(&mut conn, id).await
    }

    /// Note with its tags and subtask progress
    pub async fn get_note_detail(&self, id: &str) -> Result<NoteDetail> {
        let mut conn = self.repo.acquire().await?;
        let note = Repository::fetch_note(&mut conn, id).await?;
        let tags = Repository::note_tags(&mut conn, id).await?;
        let (subtask_count, subtask_completed) = Repository::subtask_progress(&mut conn, id).await?;

        Ok(NoteDetail {
            note,
            tags,
            subtask_count,
            subtask_completed,
        })
    }

    /// List notes, pinned first, then most recently updated
    pub async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        let mut conn = self.repo.acquire().await?;
        Repository::list_notes(&mut conn, filter).await
    }

    /// Apply a partial update
    pub async fn update_note(&self, id: &str, req: UpdateNoteRequest) -> Result<Note> {
        tracing::debug!("Updating note: {}", id);

        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;
        validate_update(&mut tx, &note, &req).await?;

        if req.touches_text() {
            VersionsService::snapshot(&mut tx, &note).await?;
        }

        let effects = apply_update(&mut note, &req);
        note.updated_at = timestamp::now();

        Repository::save_note(&mut tx, &note).await?;
        effects::apply(&mut tx, effects).await?;

        tx.commit().await?;

        tracing::debug!("Note updated successfully: {}", note.id);

        Ok(note)
    }

    /// Move a note and its subtasks to the trash, or delete them for good
    pub async fn trash_note(&self, id: &str, permanent: bool) -> Result<()> {
        tracing::info!("Trashing note: {} (permanent: {})", id, permanent);

        let mut tx = self.repo.begin_write().await?;

        let note = Repository::fetch_note(&mut tx, id).await?;
        effects::apply(&mut tx, effects::on_trash(&note)).await?;

        if permanent {
            Repository::delete_note_with_subtasks(&mut tx, id).await?;
        } else {
            Repository::set_trashed_with_subtasks(&mut tx, id, Some(timestamp::now())).await?;
        }

        tx.commit().await?;

        tracing::info!("Note trashed successfully: {}", id);

        Ok(())
    }

    /// Bring a note and its subtasks back from the trash
    pub async fn restore_note(&self, id: &str) -> Result<Note> {
        tracing::info!("Restoring note: {}", id);

        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;

        if let (true, Some(date)) = (note.is_trashed, note.daily_date) {
            if let Some(existing) = Repository::find_daily_note(&mut tx, date).await? {
                return Err(AppError::Conflict(format!(
                    "daily note {} already exists for {}",
                    existing.id, date
                )));
            }
        }

        Repository::set_trashed_with_subtasks(&mut tx, id, None).await?;

        tx.commit().await?;

        note.is_trashed = false;
        note.trashed_at = None;
        Ok(note)
    }

    /// Mark a note done, spawning its next occurrence if it recurs
    pub async fn complete_note(&self, id: &str) -> Result<Completion> {
        tracing::info!("Completing note: {}", id);

        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;
        if note.is_completed {
            return Ok(Completion {
                note,
                next_occurrence: None,
            });
        }

        let now = timestamp::now();
        note.is_completed = true;
        note.completed_at = Some(now);
        if note.status.is_some() {
            note.status = Some(Status::TERMINAL);
        }
        note.updated_at = now;

        Repository::save_note(&mut tx, &note).await?;
        let applied = effects::apply(&mut tx, effects::on_complete(&note)).await?;

        tx.commit().await?;

        Ok(Completion {
            note,
            next_occurrence: applied.spawned,
        })
    }

    /// Reopen a completed note
    pub async fn uncomplete_note(&self, id: &str) -> Result<Note> {
        tracing::info!("Reopening note: {}", id);

        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;
        note.is_completed = false;
        note.completed_at = None;
        if note.status.is_some_and(Status::is_terminal) {
            note.status = Some(Status::INITIAL);
        }
        note.updated_at = timestamp::now();

        Repository::save_note(&mut tx, &note).await?;
        tx.commit().await?;

        Ok(note)
    }

    /// Set or clear the workflow status
    pub async fn set_status(&self, id: &str, status: Option<Status>) -> Result<Note> {
        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;
        note.status = status;
        note.updated_at = timestamp::now();

        Repository::save_note(&mut tx, &note).await?;
        tx.commit().await?;

        Ok(note)
    }

    /// Stop a note from recurring
    pub async fn remove_recurrence(&self, id: &str) -> Result<Note> {
        let mut tx = self.repo.begin_write().await?;

        let mut note = Repository::fetch_note(&mut tx, id).await?;
        note.recurrence_rule = None;
        note.recurrence_source_id = None;
        note.updated_at = timestamp::now();

        Repository::save_note(&mut tx, &note).await?;
        tx.commit().await?;

        Ok(note)
    }

    pub async fn add_tag(&self, note_id: &str, tag_id: &str) -> Result<()> {
        let mut tx = self.repo.begin_write().await?;

        Repository::fetch_note(&mut tx, note_id).await?;
        if !Repository::tag_exists(&mut tx, tag_id).await? {
            return Err(AppError::NotFound(format!("Tag {}", tag_id)));
        }
        Repository::add_note_tag(&mut tx, note_id, tag_id).await?;

        tx.commit().await
    }

    pub async fn remove_tag(&self, note_id: &str, tag_id: &str) -> Result<()> {
        let mut tx = self.repo.begin_write().await?;
        Repository::remove_note_tag(&mut tx, note_id, tag_id).await?;
        tx.commit().await
    }

    /// Live subtasks in manual order
    pub async fn list_subtasks(&self, id: &str) -> Result<Vec<Note>> {
        let mut conn = self.repo.acquire().await?;
        Repository::fetch_note(&mut conn, id).await?;
        Repository::live_subtasks(&mut conn, id).await
    }

    /// Assign manual sort positions; unknown ids are skipped
    pub async fn reorder(&self, items: &[ReorderItem]) -> Result<usize> {
        let mut tx = self.repo.begin_write().await?;

        let mut moved = 0;
        for item in items {
            if Repository::set_position(&mut tx, &item.id, item.position).await? {
                moved += 1;
            }
        }

        tx.commit().await?;
        Ok(moved)
    }
}

/// Parent for a new or re-parented note: must exist, be top-level and not a daily note
async fn load_parent(conn: &mut SqliteConnection, parent_id: &str) -> Result<Note> {
    let parent = Repository::find_note(conn, parent_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Parent note {}", parent_id)))?;

    if parent.is_subtask() {
        return Err(AppError::invalid("cannot nest subtasks more than one level deep"));
    }
    if parent.is_daily {
        return Err(AppError::invalid("daily notes cannot have subtasks"));
    }

    Ok(parent)
}

async fn ensure_folder(conn: &mut SqliteConnection, folder_id: &str) -> Result<()> {
    if Repository::folder_exists(conn, folder_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Folder {}", folder_id)))
    }
}

async fn ensure_project(conn: &mut SqliteConnection, project_id: &str) -> Result<()> {
    if Repository::project_exists(conn, project_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Project {}", project_id)))
    }
}

async fn validate_update(conn: &mut SqliteConnection, note: &Note, req: &UpdateNoteRequest) -> Result<()> {
    if let Some(Some(rule)) = &req.recurrence_rule {
        rule.validate()?;
    }

    if let Some(Some(parent_id)) = &req.parent_id {
        if parent_id == &note.id {
            return Err(AppError::invalid("a note cannot be its own parent"));
        }
        if note.is_daily {
            return Err(AppError::invalid("daily notes cannot be subtasks"));
        }
        load_parent(conn, parent_id).await?;

        let (subtasks, _) = Repository::subtask_progress(conn, &note.id).await?;
        if subtasks > 0 {
            return Err(AppError::invalid("notes with subtasks cannot become subtasks"));
        }
    }

    if let Some(Some(folder_id)) = &req.folder_id {
        ensure_folder(conn, folder_id).await?;
    }

    if let Some(Some(project_id)) = &req.project_id {
        ensure_project(conn, project_id).await?;
    }

    Ok(())
}

/// Copy the requested fields onto `note`, returning the post-conditions
fn apply_update(note: &mut Note, req: &UpdateNoteRequest) -> Vec<effects::PostCondition> {
    if let Some(title) = &req.title {
        note.title = title.clone();
    }
    if let Some(content) = &req.content {
        note.content = content.clone();
    }
    if let Some(folder_id) = &req.folder_id {
        note.folder_id = folder_id.clone();
    }
    if let Some(position) = req.position {
        note.position = position;
    }
    if let Some(is_pinned) = req.is_pinned {
        note.is_pinned = is_pinned;
    }
    if let Some(due_at) = req.due_at {
        note.due_at = due_at;
    }
    if let Some(note_type) = req.note_type {
        note.note_type = note_type;
    }
    if let Some(parent_id) = &req.parent_id {
        note.parent_id = parent_id.clone();
    }
    if let Some(status) = req.status {
        note.status = status;
    }
    if let Some(project_id) = &req.project_id {
        note.project_id = project_id.clone();
    }
    if let Some(rule) = req.recurrence_rule {
        note.recurrence_rule = rule.map(Json);
    }

    effects::on_update(note, req)
}
