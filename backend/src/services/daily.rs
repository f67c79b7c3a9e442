//! Daily notes
//!
//! One live note per calendar date, created on first access.

use crate::database::{Note, Repository};
use crate::error::{AppError, Result};
use crate::ids::new_id;
use crate::services::effects;
use crate::timestamp;
use chrono::{NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::invalid(format!("invalid date '{}', expected YYYY-MM-DD", raw)))
}

/// Human readable title, e.g. `Monday, January 15, 2024`
pub fn daily_title(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

fn daily_content(title: &str) -> String {
    format!("# {}\n\n", title)
}

/// Service for daily notes
#[derive(Clone)]
pub struct DailyService {
    repo: Repository,
}

impl DailyService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Daily note for `date`, creating it if no live one exists
    pub async fn get_or_create(&self, date: &str) -> Result<Note> {
        let date = parse_date(date)?;
        self.get_or_create_for(date).await
    }

    /// Daily note for the current UTC date
    pub async fn today(&self) -> Result<Note> {
        self.get_or_create_for(Utc::now().date_naive()).await
    }

    async fn get_or_create_for(&self, date: NaiveDate) -> Result<Note> {
        let mut tx = self.repo.begin_write().await?;

        if let Some(existing) = Repository::find_daily_note(&mut tx, date).await? {
            return Ok(existing);
        }

        tracing::info!("Creating daily note for {}", date);

        let mut note = Note::blank(new_id(), timestamp::now());
        note.title = daily_title(date);
        note.content = daily_content(&note.title);
        note.is_daily = true;
        note.daily_date = Some(date);

        Repository::insert_note(&mut tx, &note).await?;
        effects::apply(&mut tx, effects::on_create(&note)).await?;

        tx.commit().await?;

        tracing::info!("Daily note created successfully: {}", note.id);

        Ok(note)
    }

    /// Live notes updated on any date in `[start, end]`, newest first
    pub async fn range(&self, start: &str, end: &str) -> Result<Vec<Note>> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;

        let mut conn = self.repo.acquire().await?;
        Repository::notes_updated_between(&mut conn, start, end).await
    }
}
