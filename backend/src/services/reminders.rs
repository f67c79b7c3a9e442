//! Reminders service
//!
//! Reminder store for notes. Due reminders are collected on request; there
//! is no background scheduler. Trashing or completing a note dismisses its
//! pending reminders through the note lifecycle.

use crate::database::{Reminder, Repository};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};

/// Reminders service
#[derive(Clone)]
pub struct RemindersService {
    repo: Repository,
}

impl RemindersService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new reminder
    pub async fn create_reminder(&self, note_id: &str, remind_at: DateTime<Utc>) -> Result<Reminder> {
        tracing::info!("Creating reminder for note {} at {}", note_id, remind_at);

        let mut tx = self.repo.begin_write().await?;
        Repository::fetch_note(&mut tx, note_id).await?;
        let reminder = Repository::create_reminder(&mut tx, note_id, remind_at).await?;
        tx.commit().await?;

        Ok(reminder)
    }

    pub async fn list_for_note(&self, note_id: &str) -> Result<Vec<Reminder>> {
        let mut conn = self.repo.acquire().await?;
        Repository::list_reminders_for_note(&mut conn, note_id).await
    }

    /// List all pending (not dismissed) reminders of live notes
    pub async fn list_pending(&self) -> Result<Vec<Reminder>> {
        let mut conn = self.repo.acquire().await?;
        Repository::list_pending_reminders(&mut conn).await
    }

    /// Fire reminders that are due as of `now`
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut tx = self.repo.begin_write().await?;
        let fired = Repository::fire_due_reminders(&mut tx, now).await?;
        tx.commit().await?;

        for reminder in &fired {
            tracing::info!("Triggering reminder {} for note {}", reminder.id, reminder.note_id);
        }

        Ok(fired)
    }

    pub async fn dismiss(&self, id: &str) -> Result<()> {
        let mut tx = self.repo.begin_write().await?;

        if !Repository::dismiss_reminder(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Reminder {}", id)));
        }

        tx.commit().await
    }

    /// Dismiss every pending reminder of a note
    pub async fn dismiss_for_note(&self, note_id: &str) -> Result<u64> {
        let mut tx = self.repo.begin_write().await?;
        let dismissed = Repository::dismiss_pending_reminders(&mut tx, note_id).await?;
        tx.commit().await?;

        Ok(dismissed)
    }
}
