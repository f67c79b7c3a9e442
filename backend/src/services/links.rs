//! Wiki-link resolver
//!
//! Parses `[[Title]]` references out of note content and keeps the
//! `note_links` table equal to the set of references that resolve to another
//! live note. The table is rebuilt from scratch on every content write.

use crate::database::{LinkedNote, Repository};
use crate::error::Result;
use regex::Regex;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use std::sync::OnceLock;

fn wikilink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wiki-link regex"))
}

/// Distinct link texts in order of first appearance
pub fn extract_wikilinks(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    wikilink_regex()
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .filter(|text| seen.insert(*text))
        .map(str::to_string)
        .collect()
}

/// Service for link queries
#[derive(Clone)]
pub struct LinksService {
    repo: Repository,
}

impl LinksService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Rebuild the outgoing links of `note_id` from `content`.
    ///
    /// Must run on the connection that wrote the content so both land in
    /// the same transaction. Returns the resolved target ids.
    pub async fn sync_links(
        conn: &mut SqliteConnection,
        note_id: &str,
        content: &str,
    ) -> Result<Vec<String>> {
        Repository::delete_outgoing_links(conn, note_id).await?;

        let mut targets = Vec::new();
        for title in extract_wikilinks(content) {
            match Repository::resolve_title(conn, &title).await? {
                Some(target_id) if target_id != note_id => {
                    Repository::insert_link(conn, note_id, &target_id).await?;
                    targets.push(target_id);
                }
                _ => {}
            }
        }

        tracing::debug!("Synced {} outgoing links for note: {}", targets.len(), note_id);
        Ok(targets)
    }

    /// Live notes that link to `note_id`
    pub async fn backlinks(&self, note_id: &str) -> Result<Vec<LinkedNote>> {
        let mut conn = self.repo.acquire().await?;
        Repository::fetch_note(&mut conn, note_id).await?;
        Repository::backlinks(&mut conn, note_id).await
    }

    /// Live notes `note_id` links to
    pub async fn outgoing(&self, note_id: &str) -> Result<Vec<LinkedNote>> {
        let mut conn = self.repo.acquire().await?;
        Repository::fetch_note(&mut conn, note_id).await?;
        Repository::outgoing_notes(&mut conn, note_id).await
    }
}
