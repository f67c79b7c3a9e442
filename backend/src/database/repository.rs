//! Repository layer for database operations
//!
//! `Repository` owns the pool and the single-writer gate. Mutations run
//! inside a [`WriteTransaction`]; the row-level operations below take a bare
//! connection so that services can compose several of them into one atomic
//! unit. Reads use a pooled connection without a transaction.

use super::models::*;
use crate::config;
use crate::error::{AppError, Result};
use crate::ids::new_id;
use crate::timestamp;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

/// Exclusive write transaction.
///
/// Holds the writer gate for its whole lifetime. Dropping it without
/// calling [`commit`](Self::commit) rolls every statement back.
pub struct WriteTransaction {
    // Declared first so the rollback runs before the gate is released
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl WriteTransaction {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

fn map_unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message()),
        _ => AppError::Database(err),
    }
}

fn format_opt(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(timestamp::format)
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Start the single writer's transaction, waiting for any writer in flight
    pub async fn begin_write(&self) -> Result<WriteTransaction> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTransaction { tx, _gate: gate })
    }

    /// Pooled connection for reads
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    // ===== Notes =====

    pub async fn insert_note(conn: &mut SqliteConnection, note: &Note) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notes (
                id, title, content, folder_id, position, is_pinned, is_trashed, trashed_at,
                is_completed, completed_at, note_type, is_daily, daily_date, due_at,
                parent_id, status, project_id, recurrence_rule, recurrence_source_id,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.folder_id)
        .bind(note.position)
        .bind(note.is_pinned)
        .bind(note.is_trashed)
        .bind(format_opt(&note.trashed_at))
        .bind(note.is_completed)
        .bind(format_opt(&note.completed_at))
        .bind(note.note_type)
        .bind(note.is_daily)
        .bind(note.daily_date)
        .bind(format_opt(&note.due_at))
        .bind(&note.parent_id)
        .bind(note.status)
        .bind(&note.project_id)
        .bind(note.recurrence_rule.as_ref().map(|rule| Json(rule.0)))
        .bind(&note.recurrence_source_id)
        .bind(timestamp::format(&note.created_at))
        .bind(timestamp::format(&note.updated_at))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || daily_conflict_message(note)))?;

        tracing::debug!("Inserted note: {}", note.id);
        Ok(())
    }

    /// Write every mutable column of `note` back to its row
    pub async fn save_note(conn: &mut SqliteConnection, note: &Note) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE notes SET
                title = ?, content = ?, folder_id = ?, position = ?, is_pinned = ?,
                is_trashed = ?, trashed_at = ?, is_completed = ?, completed_at = ?,
                note_type = ?, is_daily = ?, daily_date = ?, due_at = ?, parent_id = ?,
                status = ?, project_id = ?, recurrence_rule = ?, recurrence_source_id = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.folder_id)
        .bind(note.position)
        .bind(note.is_pinned)
        .bind(note.is_trashed)
        .bind(format_opt(&note.trashed_at))
        .bind(note.is_completed)
        .bind(format_opt(&note.completed_at))
        .bind(note.note_type)
        .bind(note.is_daily)
        .bind(note.daily_date)
        .bind(format_opt(&note.due_at))
        .bind(&note.parent_id)
        .bind(note.status)
        .bind(&note.project_id)
        .bind(note.recurrence_rule.as_ref().map(|rule| Json(rule.0)))
        .bind(&note.recurrence_source_id)
        .bind(timestamp::format(&note.updated_at))
        .bind(&note.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || daily_conflict_message(note)))?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(note.id.clone()));
        }

        tracing::debug!("Saved note: {}", note.id);
        Ok(())
    }

    pub async fn find_note(conn: &mut SqliteConnection, id: &str) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(note)
    }

    /// Get a note by ID, trashed or not
    pub async fn fetch_note(conn: &mut SqliteConnection, id: &str) -> Result<Note> {
        Self::find_note(conn, id)
            .await?
            .ok_or_else(|| AppError::NoteNotFound(id.to_string()))
    }

    pub async fn list_notes(conn: &mut SqliteConnection, filter: &NoteFilter) -> Result<Vec<Note>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT n.* FROM notes n");

        if let Some(tag_id) = &filter.tag_id {
            query
                .push(" JOIN note_tags nt ON nt.note_id = n.id AND nt.tag_id = ")
                .push_bind(tag_id.clone());
        }

        query.push(" WHERE n.is_trashed = ").push_bind(filter.trashed);

        // Top-level notes unless a parent is asked for
        if let Some(parent_id) = &filter.parent_id {
            query.push(" AND n.parent_id = ").push_bind(parent_id.clone());
        } else {
            query.push(" AND n.parent_id IS NULL");
        }

        match filter.completed {
            Some(completed) => {
                query.push(" AND n.is_completed = ").push_bind(completed);
            }
            None if !filter.trashed => {
                query.push(" AND n.is_completed = 0");
            }
            None => {}
        }

        if let Some(folder_id) = &filter.folder_id {
            query.push(" AND n.folder_id = ").push_bind(folder_id.clone());
        }

        if let Some(pinned) = filter.pinned {
            query.push(" AND n.is_pinned = ").push_bind(pinned);
        }

        match filter.status {
            Some(StatusFilter::Unset) => {
                query.push(" AND n.status IS NULL");
            }
            Some(StatusFilter::Is(status)) => {
                query.push(" AND n.status = ").push_bind(status);
            }
            None => {}
        }

        if let Some(project_id) = &filter.project_id {
            query.push(" AND n.project_id = ").push_bind(project_id.clone());
        }

        query.push(" ORDER BY n.is_pinned DESC, n.updated_at DESC, n.id DESC");

        let notes = query.build_query_as::<Note>().fetch_all(&mut *conn).await?;
        Ok(notes)
    }

    pub async fn live_subtasks(conn: &mut SqliteConnection, parent_id: &str) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            r#"
            SELECT * FROM notes
            WHERE parent_id = ? AND is_trashed = 0
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(notes)
    }

    /// (total, completed) subtask counts
    pub async fn subtask_progress(conn: &mut SqliteConnection, parent_id: &str) -> Result<(i64, i64)> {
        let progress: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(is_completed), 0)
            FROM notes WHERE parent_id = ?
            "#,
        )
        .bind(parent_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(progress)
    }

    /// Set or clear the trashed state of a note and its direct subtasks
    pub async fn set_trashed_with_subtasks(
        conn: &mut SqliteConnection,
        id: &str,
        trashed_at: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let rows = sqlx::query(
            "UPDATE notes SET is_trashed = ?, trashed_at = ? WHERE id = ? OR parent_id = ?",
        )
        .bind(trashed_at.is_some())
        .bind(format_opt(&trashed_at))
        .bind(id)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        tracing::debug!("Set trashed={} on {} rows under note {}", trashed_at.is_some(), rows, id);
        Ok(rows)
    }

    /// Hard delete a note and its direct subtasks. Versions, links, tag joins
    /// and reminders go with them through foreign-key cascades.
    pub async fn delete_note_with_subtasks(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
        let subtasks = sqlx::query("DELETE FROM notes WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let notes = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        tracing::debug!("Hard deleted note {} and {} subtasks", id, subtasks);
        Ok(notes + subtasks)
    }

    pub async fn set_position(conn: &mut SqliteConnection, id: &str, position: f64) -> Result<bool> {
        let rows = sqlx::query("UPDATE notes SET position = ? WHERE id = ?")
            .bind(position)
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Live daily note for a calendar date
    pub async fn find_daily_note(conn: &mut SqliteConnection, date: NaiveDate) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            "SELECT * FROM notes WHERE daily_date = ? AND is_trashed = 0 LIMIT 1",
        )
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(note)
    }

    /// Live notes whose `updated_at` falls on a date in `[start, end]`
    pub async fn notes_updated_between(
        conn: &mut SqliteConnection,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            r#"
            SELECT * FROM notes
            WHERE is_trashed = 0 AND substr(updated_at, 1, 10) BETWEEN ? AND ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_all(&mut *conn)
        .await?;

        Ok(notes)
    }

    // ===== Tags =====

    pub async fn create_tag(conn: &mut SqliteConnection, name: &str, color: Option<&str>) -> Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name, color, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(color.unwrap_or(config::DEFAULT_TAG_COLOR))
        .bind(timestamp::format(&timestamp::now()))
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("tag '{}' already exists", name)))?;

        tracing::debug!("Created tag: {} ({})", tag.name, tag.id);
        Ok(tag)
    }

    pub async fn tag_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        exists(conn, "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?)", id).await
    }

    pub async fn list_tags(conn: &mut SqliteConnection) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name ASC")
            .fetch_all(&mut *conn)
            .await?;

        Ok(tags)
    }

    pub async fn note_tags(conn: &mut SqliteConnection, note_id: &str) -> Result<Vec<TagBrief>> {
        let tags = sqlx::query_as::<_, TagBrief>(
            r#"
            SELECT t.id, t.name, t.color FROM tags t
            JOIN note_tags nt ON nt.tag_id = t.id
            WHERE nt.note_id = ?
            ORDER BY t.name ASC
            "#,
        )
        .bind(note_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(tags)
    }

    pub async fn add_note_tag(conn: &mut SqliteConnection, note_id: &str, tag_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?, ?)")
            .bind(note_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn remove_note_tag(conn: &mut SqliteConnection, note_id: &str, tag_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM note_tags WHERE note_id = ? AND tag_id = ?")
            .bind(note_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Copy every tag of `from` onto `to`
    pub async fn copy_note_tags(conn: &mut SqliteConnection, from: &str, to: &str) -> Result<u64> {
        let rows = sqlx::query(
            r#"
            INSERT OR IGNORE INTO note_tags (note_id, tag_id)
            SELECT ?, tag_id FROM note_tags WHERE note_id = ?
            "#,
        )
        .bind(to)
        .bind(from)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(rows)
    }

    // ===== Folders & projects =====

    pub async fn create_folder(
        conn: &mut SqliteConnection,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Folder> {
        let now = timestamp::format(&timestamp::now());

        let folder = sqlx::query_as::<_, Folder>(
            r#"
            INSERT INTO folders (id, name, parent_id, position, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(parent_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!("Created folder: {}", folder.id);
        Ok(folder)
    }

    pub async fn folder_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        exists(conn, "SELECT EXISTS(SELECT 1 FROM folders WHERE id = ?)", id).await
    }

    /// Delete a folder; notes inside it fall back to no folder
    pub async fn delete_folder(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn create_project(
        conn: &mut SqliteConnection,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let now = timestamp::format(&timestamp::now());

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!("Created project: {}", project.id);
        Ok(project)
    }

    pub async fn project_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        exists(conn, "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?)", id).await
    }

    /// Delete a project, unsetting it on its notes
    pub async fn delete_project(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        sqlx::query("UPDATE notes SET project_id = NULL WHERE project_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let rows = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    // ===== Reminders =====

    pub async fn create_reminder(
        conn: &mut SqliteConnection,
        note_id: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<Reminder> {
        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            INSERT INTO reminders (id, note_id, remind_at, is_fired, is_dismissed, created_at)
            VALUES (?, ?, ?, 0, 0, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(note_id)
        .bind(timestamp::format(&remind_at))
        .bind(timestamp::format(&timestamp::now()))
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!("Created reminder: {} for note: {}", reminder.id, note_id);
        Ok(reminder)
    }

    pub async fn list_reminders_for_note(conn: &mut SqliteConnection, note_id: &str) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE note_id = ? ORDER BY remind_at ASC",
        )
        .bind(note_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(reminders)
    }

    /// Undismissed reminders across all live notes, soonest first
    pub async fn list_pending_reminders(conn: &mut SqliteConnection) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT r.* FROM reminders r
            JOIN notes n ON n.id = r.note_id
            WHERE r.is_dismissed = 0 AND n.is_trashed = 0
            ORDER BY r.remind_at ASC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(reminders)
    }

    pub async fn dismiss_reminder(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let rows = sqlx::query("UPDATE reminders SET is_dismissed = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Mark undismissed reminders of live notes due at or before `now` as
    /// fired, returning them
    pub async fn fire_due_reminders(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            UPDATE reminders SET is_fired = 1
            WHERE is_fired = 0 AND is_dismissed = 0 AND remind_at <= ?
              AND note_id IN (SELECT id FROM notes WHERE is_trashed = 0)
            RETURNING *
            "#,
        )
        .bind(timestamp::format(&now))
        .fetch_all(&mut *conn)
        .await?;

        Ok(reminders)
    }

    /// Dismiss every pending reminder of a note, returning how many changed
    pub async fn dismiss_pending_reminders(conn: &mut SqliteConnection, note_id: &str) -> Result<u64> {
        let rows = sqlx::query(
            "UPDATE reminders SET is_dismissed = 1 WHERE note_id = ? AND is_dismissed = 0",
        )
        .bind(note_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if rows > 0 {
            tracing::debug!("Dismissed {} reminders for note: {}", rows, note_id);
        }
        Ok(rows)
    }
}

async fn exists(conn: &mut SqliteConnection, sql: &str, id: &str) -> Result<bool> {
    let found: bool = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(found)
}

fn daily_conflict_message(note: &Note) -> String {
    match note.daily_date {
        Some(date) => format!("a daily note for {} already exists", date),
        None => format!("note {} conflicts with an existing row", note.id),
    }
}
