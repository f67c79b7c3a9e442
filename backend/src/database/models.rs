//! Database models
//!
//! Rust structs representing database entities and the request shapes that
//! mutate them. String-typed columns with a closed set of values are
//! modelled as enums and validated when they cross into the crate.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Kind of note body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Note,
    Checklist,
}

/// Workflow status of a note on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Status {
    Backlog,
    Todo,
    InProgress,
    Done,
}

impl Status {
    /// Status a note re-enters when it stops being finished
    pub const INITIAL: Status = Status::Todo;

    /// Status forced onto a note when it is completed
    pub const TERMINAL: Status = Status::Done;

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Backlog => "backlog",
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "backlog" => Ok(Status::Backlog),
            "todo" => Ok(Status::Todo),
            "in_progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            other => Err(AppError::invalid(format!("unknown status '{}'", other))),
        }
    }
}

/// Recurrence frequency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

fn default_interval() -> u32 {
    1
}

/// Repeat rule carried by recurring notes, stored as JSON `{freq, interval}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency, interval: u32) -> Self {
        Self { freq, interval }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(AppError::invalid("recurrence interval must be at least 1"));
        }
        Ok(())
    }
}

/// A note: markdown content plus organization, workflow and scheduling state
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub folder_id: Option<String>,
    pub position: f64,
    pub is_pinned: bool,
    pub is_trashed: bool,
    #[serde(with = "crate::timestamp::option")]
    pub trashed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    #[serde(with = "crate::timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    pub note_type: NoteType,
    pub is_daily: bool,
    pub daily_date: Option<NaiveDate>,
    #[serde(with = "crate::timestamp::option")]
    pub due_at: Option<DateTime<Utc>>,
    pub parent_id: Option<String>,
    pub status: Option<Status>,
    pub project_id: Option<String>,
    pub recurrence_rule: Option<Json<RecurrenceRule>>,
    pub recurrence_source_id: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// A fresh, unsaved note with every optional field empty
    pub fn blank(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            folder_id: None,
            position: 0.0,
            is_pinned: false,
            is_trashed: false,
            trashed_at: None,
            is_completed: false,
            completed_at: None,
            note_type: NoteType::Note,
            is_daily: false,
            daily_date: None,
            due_at: None,
            parent_id: None,
            status: None,
            project_id: None,
            recurrence_rule: None,
            recurrence_source_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn recurrence(&self) -> Option<RecurrenceRule> {
        self.recurrence_rule.as_ref().map(|rule| rule.0)
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Create note request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
    pub folder_id: Option<String>,
    pub note_type: NoteType,
    pub parent_id: Option<String>,
    pub status: Option<Status>,
    pub project_id: Option<String>,
    pub recurrence_rule: Option<RecurrenceRule>,
    #[serde(with = "crate::timestamp::option")]
    pub due_at: Option<DateTime<Utc>>,
}

/// Partial note update.
///
/// Nullable references use `Option<Option<_>>`: the outer `None` leaves the
/// field alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub folder_id: Option<Option<String>>,
    pub position: Option<f64>,
    pub is_pinned: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub note_type: Option<NoteType>,
    #[serde(deserialize_with = "nullable")]
    pub parent_id: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub status: Option<Option<Status>>,
    #[serde(deserialize_with = "nullable")]
    pub project_id: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub recurrence_rule: Option<Option<RecurrenceRule>>,
}

impl UpdateNoteRequest {
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Status filter for listings; `none` selects notes without a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Unset,
    Is(Status),
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "none" {
            Ok(StatusFilter::Unset)
        } else {
            s.parse().map(StatusFilter::Is)
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Listing filters. Defaults select live, unfinished, top-level notes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteFilter {
    pub folder_id: Option<String>,
    pub tag_id: Option<String>,
    pub trashed: bool,
    pub pinned: Option<bool>,
    pub completed: Option<bool>,
    pub parent_id: Option<String>,
    pub status: Option<StatusFilter>,
    pub project_id: Option<String>,
}

/// Note with its tags and subtask progress
#[derive(Debug, Clone, Serialize)]
pub struct NoteDetail {
    #[serde(flatten)]
    pub note: Note,
    pub tags: Vec<TagBrief>,
    pub subtask_count: i64,
    pub subtask_completed: i64,
}

/// Position assignment used by bulk reordering
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderItem {
    pub id: String,
    pub position: f64,
}

/// Immutable snapshot of a note's title and content
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NoteVersion {
    pub id: String,
    pub note_id: String,
    pub title: String,
    pub content: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Version listing entry (content omitted)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VersionBrief {
    pub id: String,
    pub title: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Directed wiki-link edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct NoteLink {
    pub source_id: String,
    pub target_id: String,
}

/// Note on the other end of a link, as shown in backlink panels
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LinkedNote {
    pub id: String,
    pub title: String,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Folder (collaborator table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub position: f64,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Project (collaborator table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Tag (collaborator table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TagBrief {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Reminder for a note
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: String,
    pub note_id: String,
    #[serde(with = "crate::timestamp")]
    pub remind_at: DateTime<Utc>,
    pub is_fired: bool,
    pub is_dismissed: bool,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Ranked full-text hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub folder_id: Option<String>,
    pub folder_name: Option<String>,
    /// Relevance; higher is better
    pub score: f64,
}

/// Graph vertex; `title` is the raw title, possibly empty
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Link,
    Tag,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [Status::Backlog, Status::Todo, Status::InProgress, Status::Done] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("finished".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_filter_none() {
        assert_eq!("none".parse::<StatusFilter>().unwrap(), StatusFilter::Unset);
        assert_eq!(
            "in_progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Is(Status::InProgress)
        );
    }

    #[test]
    fn test_recurrence_rule_defaults_interval() {
        let rule: RecurrenceRule = serde_json::from_str(r#"{"freq":"weekly"}"#).unwrap();
        assert_eq!(rule, RecurrenceRule::new(Frequency::Weekly, 1));
        assert!(serde_json::from_str::<RecurrenceRule>(r#"{"freq":"hourly"}"#).is_err());
        assert!(RecurrenceRule::new(Frequency::Daily, 0).validate().is_err());
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateNoteRequest =
            serde_json::from_str(r#"{"parent_id": null, "title": "T"}"#).unwrap();
        assert_eq!(req.parent_id, Some(None));
        assert_eq!(req.folder_id, None);
        assert!(req.touches_text());

        let req: UpdateNoteRequest = serde_json::from_str(r#"{"status": "done"}"#).unwrap();
        assert_eq!(req.status, Some(Some(Status::Done)));
        assert!(!req.touches_text());
    }

    #[test]
    fn test_note_serializes_timestamps_with_z() {
        let now = crate::timestamp::parse("2024-05-01T10:00:00.000Z").unwrap();
        let mut note = Note::blank("n1".into(), now);
        note.recurrence_rule = Some(Json(RecurrenceRule::new(Frequency::Monthly, 2)));

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["created_at"], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["due_at"], serde_json::Value::Null);
        assert_eq!(value["note_type"], "note");
        assert_eq!(value["recurrence_rule"]["freq"], "monthly");
        assert_eq!(value["recurrence_rule"]["interval"], 2);
    }
}
