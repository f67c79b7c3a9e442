//! Recurrence expander
//!
//! When a recurring note is completed, a fresh copy is created with its due
//! date advanced by one interval of the rule. Month and year steps use
//! calendar arithmetic: Jan 31 + 1 month is the last day of February.

use crate::database::{Frequency, Note, RecurrenceRule, Repository, Status};
use crate::error::{AppError, Result};
use crate::ids::new_id;
use crate::services::links::LinksService;
use crate::timestamp;
use chrono::{DateTime, Duration, Months, Utc};
use sqlx::types::Json;
use sqlx::SqliteConnection;

/// Advance `anchor` by one step of `rule`
pub fn advance(anchor: DateTime<Utc>, rule: &RecurrenceRule) -> Result<DateTime<Utc>> {
    rule.validate()?;
    let interval = rule.interval;

    let next = match rule.freq {
        Frequency::Daily => anchor.checked_add_signed(Duration::days(i64::from(interval))),
        Frequency::Weekly => anchor.checked_add_signed(Duration::weeks(i64::from(interval))),
        Frequency::Monthly => anchor.checked_add_months(Months::new(interval)),
        Frequency::Yearly => interval
            .checked_mul(12)
            .and_then(|months| anchor.checked_add_months(Months::new(months))),
    };

    next.ok_or_else(|| AppError::invalid("next occurrence is out of the supported date range"))
}

/// Due date of the next occurrence. Without a current due date the step is
/// taken from now.
pub fn compute_next_due(current_due: Option<DateTime<Utc>>, rule: &RecurrenceRule) -> Result<DateTime<Utc>> {
    let anchor = current_due.unwrap_or_else(timestamp::now);
    advance(anchor, rule)
}

/// Build the unsaved next occurrence of a completed recurring note
pub fn next_occurrence(source: &Note, rule: &RecurrenceRule, now: DateTime<Utc>) -> Result<Note> {
    let mut next = Note::blank(new_id(), now);
    next.title = source.title.clone();
    next.content = source.content.clone();
    next.folder_id = source.folder_id.clone();
    next.note_type = source.note_type;
    next.project_id = source.project_id.clone();
    next.status = source.status.map(|_| Status::INITIAL);
    next.recurrence_rule = Some(Json(*rule));
    next.recurrence_source_id = Some(source.id.clone());
    next.due_at = Some(compute_next_due(source.due_at, rule)?);
    Ok(next)
}

/// Insert the next occurrence of `source`, cloning its tags and links
pub async fn spawn_next_occurrence(conn: &mut SqliteConnection, source: &Note) -> Result<Option<Note>> {
    let Some(rule) = source.recurrence() else {
        return Ok(None);
    };

    let next = next_occurrence(source, &rule, timestamp::now())?;

    Repository::insert_note(conn, &next).await?;
    Repository::copy_note_tags(conn, &source.id, &next.id).await?;
    LinksService::sync_links(conn, &next.id, &next.content).await?;

    tracing::info!(
        "Spawned occurrence {} of note {} due {}",
        next.id,
        source.id,
        timestamp::format(&next.due_at.unwrap_or(next.created_at))
    );

    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NoteType;

    fn at(raw: &str) -> DateTime<Utc> {
        timestamp::parse(raw).unwrap()
    }

    fn rule(freq: Frequency, interval: u32) -> RecurrenceRule {
        RecurrenceRule::new(freq, interval)
    }

    #[test]
    fn test_daily_and_weekly_steps() {
        let start = at("2024-02-27T09:30:00.000Z");
        assert_eq!(
            advance(start, &rule(Frequency::Daily, 3)).unwrap(),
            at("2024-03-01T09:30:00.000Z")
        );
        assert_eq!(
            advance(start, &rule(Frequency::Weekly, 2)).unwrap(),
            at("2024-03-12T09:30:00.000Z")
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let jan31 = at("2024-01-31T00:00:00.000Z");
        assert_eq!(
            advance(jan31, &rule(Frequency::Monthly, 1)).unwrap(),
            at("2024-02-29T00:00:00.000Z")
        );

        let jan31_2023 = at("2023-01-31T00:00:00.000Z");
        assert_eq!(
            advance(jan31_2023, &rule(Frequency::Monthly, 1)).unwrap(),
            at("2023-02-28T00:00:00.000Z")
        );

        assert_eq!(
            advance(jan31, &rule(Frequency::Monthly, 3)).unwrap(),
            at("2024-04-30T00:00:00.000Z")
        );
    }

    #[test]
    fn test_yearly_from_leap_day() {
        let leap = at("2024-02-29T12:00:00.000Z");
        assert_eq!(
            advance(leap, &rule(Frequency::Yearly, 1)).unwrap(),
            at("2025-02-28T12:00:00.000Z")
        );
        assert_eq!(
            advance(leap, &rule(Frequency::Yearly, 4)).unwrap(),
            at("2028-02-29T12:00:00.000Z")
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = advance(Utc::now(), &rule(Frequency::Daily, 0));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_due_anchors_to_now() {
        let before = timestamp::now();
        let next = compute_next_due(None, &rule(Frequency::Daily, 1)).unwrap();
        let after = timestamp::now();

        assert!(next >= before + Duration::days(1));
        assert!(next <= after + Duration::days(1));
        assert_eq!(next.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_next_occurrence_clones_fields() {
        let now = timestamp::now();
        let mut source = Note::blank("src".into(), at("2024-01-01T00:00:00.000Z"));
        source.title = "Pay rent".into();
        source.content = "[[Budget]]".into();
        source.folder_id = Some("f1".into());
        source.project_id = Some("p1".into());
        source.note_type = NoteType::Checklist;
        source.status = Some(Status::Done);
        source.is_completed = true;
        source.is_pinned = true;
        source.due_at = Some(at("2024-01-31T00:00:00.000Z"));
        let monthly = rule(Frequency::Monthly, 1);
        source.recurrence_rule = Some(Json(monthly));

        let next = next_occurrence(&source, &monthly, now).unwrap();

        assert_ne!(next.id, source.id);
        assert_eq!(next.title, "Pay rent");
        assert_eq!(next.content, "[[Budget]]");
        assert_eq!(next.folder_id.as_deref(), Some("f1"));
        assert_eq!(next.project_id.as_deref(), Some("p1"));
        assert_eq!(next.note_type, NoteType::Checklist);
        assert_eq!(next.status, Some(Status::Todo));
        assert!(!next.is_completed);
        assert!(!next.is_pinned);
        assert_eq!(next.recurrence(), Some(monthly));
        assert_eq!(next.recurrence_source_id.as_deref(), Some("src"));
        assert_eq!(next.due_at, Some(at("2024-02-29T00:00:00.000Z")));
        assert_eq!(next.created_at, now);
    }

    #[test]
    fn test_next_occurrence_without_status_keeps_none() {
        let source = Note::blank("src".into(), timestamp::now());
        let next = next_occurrence(&source, &rule(Frequency::Weekly, 1), timestamp::now()).unwrap();
        assert_eq!(next.status, None);
    }
}
