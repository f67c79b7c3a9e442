//! Post-conditions of note mutations
//!
//! Each lifecycle operation writes the note row(s) and then applies an
//! ordered list of post-conditions on the same transaction. Planning is pure,
//! so the list each operation produces can be checked on its own.

use crate::database::{Note, Repository, UpdateNoteRequest};
use crate::error::Result;
use crate::services::links::LinksService;
use crate::services::recurrence;
use sqlx::SqliteConnection;

#[derive(Debug, Clone)]
pub enum PostCondition {
    /// Outgoing links of the note equal the resolvable wiki-links in `content`
    SyncLinks { note_id: String, content: String },
    /// No pending reminders remain for the note
    DismissReminders { note_id: String },
    /// The completed recurring note has a successor
    SpawnNextOccurrence { source: Box<Note> },
}

/// What applying a list of post-conditions changed
#[derive(Debug, Default)]
pub struct Applied {
    pub synced_links: usize,
    pub dismissed_reminders: u64,
    pub spawned: Option<Note>,
}

/// Post-conditions of creating `note`
pub fn on_create(note: &Note) -> Vec<PostCondition> {
    vec![PostCondition::SyncLinks {
        note_id: note.id.clone(),
        content: note.content.clone(),
    }]
}

/// Post-conditions of applying `req` to a note, given its new state
pub fn on_update(note: &Note, req: &UpdateNoteRequest) -> Vec<PostCondition> {
    if req.content.is_some() {
        on_create(note)
    } else {
        Vec::new()
    }
}

/// Post-conditions of trashing a note, permanently or not
pub fn on_trash(note: &Note) -> Vec<PostCondition> {
    vec![PostCondition::DismissReminders {
        note_id: note.id.clone(),
    }]
}

/// Post-conditions of completing a note, given its completed state
pub fn on_complete(note: &Note) -> Vec<PostCondition> {
    let mut effects = vec![PostCondition::DismissReminders {
        note_id: note.id.clone(),
    }];

    if note.recurrence().is_some() {
        effects.push(PostCondition::SpawnNextOccurrence {
            source: Box::new(note.clone()),
        });
    }

    effects
}

/// Apply post-conditions in order
pub async fn apply(conn: &mut SqliteConnection, effects: Vec<PostCondition>) -> Result<Applied> {
    let mut applied = Applied::default();

    for effect in effects {
        match effect {
            PostCondition::SyncLinks { note_id, content } => {
                let targets = LinksService::sync_links(conn, &note_id, &content).await?;
                applied.synced_links += targets.len();
            }
            PostCondition::DismissReminders { note_id } => {
                applied.dismissed_reminders +=
                    Repository::dismiss_pending_reminders(conn, &note_id).await?;
            }
            PostCondition::SpawnNextOccurrence { source } => {
                applied.spawned = recurrence::spawn_next_occurrence(conn, &source).await?;
            }
        }
    }

    tracing::debug!(
        "Applied post-conditions: {} links synced, {} reminders dismissed",
        applied.synced_links,
        applied.dismissed_reminders
    );

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_pool, Frequency, RecurrenceRule};
    use crate::timestamp;
    use chrono::Utc;
    use sqlx::types::Json;

    fn note() -> Note {
        let mut note = Note::blank("n1".into(), timestamp::now());
        note.content = "[[Other]]".into();
        note
    }

    #[test]
    fn test_create_syncs_links() {
        let effects = on_create(&note());
        assert!(matches!(
            effects.as_slice(),
            [PostCondition::SyncLinks { note_id, content }] if note_id == "n1" && content == "[[Other]]"
        ));
    }

    #[test]
    fn test_update_syncs_only_on_content() {
        let title_only = UpdateNoteRequest {
            title: Some("New".into()),
            ..Default::default()
        };
        assert!(on_update(&note(), &title_only).is_empty());

        let with_content = UpdateNoteRequest {
            content: Some("[[Other]]".into()),
            ..Default::default()
        };
        assert_eq!(on_update(&note(), &with_content).len(), 1);
    }

    #[test]
    fn test_trash_dismisses_reminders() {
        assert!(matches!(
            on_trash(&note()).as_slice(),
            [PostCondition::DismissReminders { .. }]
        ));
    }

    #[test]
    fn test_complete_spawns_only_when_recurring() {
        let plain = note();
        assert_eq!(on_complete(&plain).len(), 1);

        let mut recurring = note();
        recurring.recurrence_rule = Some(Json(RecurrenceRule::new(Frequency::Daily, 1)));
        let effects = on_complete(&recurring);
        assert!(matches!(
            effects.as_slice(),
            [PostCondition::DismissReminders { .. }, PostCondition::SpawnNextOccurrence { .. }]
        ));
    }

    #[tokio::test]
    async fn test_apply_reports_changes() {
        let repo = Repository::new(memory_pool().await);
        let mut tx = repo.begin_write().await.unwrap();

        let mut target = Note::blank("n2".into(), timestamp::now());
        target.title = "Other".into();
        Repository::insert_note(&mut tx, &target).await.unwrap();

        let source = note();
        Repository::insert_note(&mut tx, &source).await.unwrap();

        let applied = apply(&mut tx, on_create(&source)).await.unwrap();
        assert_eq!(applied.synced_links, 1);
        assert_eq!(applied.dismissed_reminders, 0);
        assert!(applied.spawned.is_none());

        Repository::create_reminder(&mut tx, &source.id, Utc::now()).await.unwrap();
        Repository::create_reminder(&mut tx, &source.id, Utc::now()).await.unwrap();

        let applied = apply(&mut tx, on_trash(&source)).await.unwrap();
        assert_eq!(applied.synced_links, 0);
        assert_eq!(applied.dismissed_reminders, 2);

        let applied = apply(&mut tx, on_trash(&source)).await.unwrap();
        assert_eq!(applied.dismissed_reminders, 0);
    }
}
