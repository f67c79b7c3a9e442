//! Full-text search over live notes
//!
//! Free text is split into word tokens; every token becomes a quoted prefix
//! term and the terms are ANDed together. Input the index still rejects is
//! treated as "no results" instead of an error.

use crate::config;
use crate::database::{Repository, SearchResult};
use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid token regex"))
}

/// FTS5 MATCH expression for `raw`, or `None` when it has no word tokens
pub fn build_match_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = token_regex()
        .find_iter(raw)
        .map(|token| format!("\"{}\"*", token.as_str()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// FTS5 refused the MATCH expression; anything else is a storage failure
fn is_rejected_query(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("fts5"))
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(config::DEFAULT_SEARCH_LIMIT)
        .clamp(1, config::MAX_SEARCH_LIMIT)
}

/// Service for ranked note search
#[derive(Clone)]
pub struct SearchService {
    repo: Repository,
}

impl SearchService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Ranked hits, most relevant first
    pub async fn search(&self, query: &str, limit: Option<u32>) -> Result<Vec<SearchResult>> {
        let Some(match_expr) = build_match_query(query) else {
            return Ok(Vec::new());
        };

        let mut conn = self.repo.acquire().await?;

        let rows = match Repository::search_index(&mut conn, &match_expr, clamp_limit(limit)).await {
            Ok(rows) => rows,
            Err(err) if is_rejected_query(&err) => {
                tracing::warn!("Search query {:?} rejected by index: {}", match_expr, err);
                return Ok(Vec::new());
            }
            Err(err) => return Err(AppError::Database(err)),
        };

        tracing::debug!("Search {:?} returned {} hits", query, rows.len());

        Ok(rows
            .into_iter()
            .map(|row| SearchResult {
                id: row.id,
                title: row.title,
                snippet: row.snippet,
                folder_id: row.folder_id,
                folder_name: row.folder_name,
                score: -row.bm25_rank,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_pool, Note, UpdateNoteRequest};
    use crate::ids::new_id;
    use crate::services::NotesService;
    use crate::timestamp;

    async fn setup(notes: &[(&str, &str)]) -> (SearchService, Repository) {
        let repo = Repository::new(memory_pool().await);

        let mut tx = repo.begin_write().await.unwrap();
        for (title, content) in notes {
            let mut note = Note::blank(new_id(), timestamp::now());
            note.title = title.to_string();
            note.content = content.to_string();
            Repository::insert_note(&mut tx, &note).await.unwrap();
        }
        tx.commit().await.unwrap();

        (SearchService::new(repo.clone()), repo)
    }

    #[test]
    fn test_build_match_query() {
        assert_eq!(build_match_query("proj"), Some("\"proj\"*".to_string()));
        assert_eq!(
            build_match_query("  rust, async!  "),
            Some("\"rust\"* \"async\"*".to_string())
        );
        assert_eq!(build_match_query("\"OR\" AND"), Some("\"OR\"* \"AND\"*".to_string()));
        assert_eq!(build_match_query(""), None);
        assert_eq!(build_match_query("   \t "), None);
        assert_eq!(build_match_query("*()\""), None);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), config::DEFAULT_SEARCH_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), config::MAX_SEARCH_LIMIT);
    }

    #[tokio::test]
    async fn test_prefix_match() {
        let (service, _) = setup(&[("Project Alpha", ""), ("Personal", "")]).await;

        let results = service.search("proj", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Project Alpha");
    }

    #[tokio::test]
    async fn test_tokens_are_anded() {
        let (service, _) = setup(&[
            ("Groceries", "milk and eggs"),
            ("Breakfast", "eggs and toast"),
        ])
        .await;

        let results = service.search("egg toa", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Breakfast");
    }

    #[tokio::test]
    async fn test_title_hits_rank_first() {
        let (service, _) = setup(&[
            ("Meeting notes", "talked about the garden"),
            ("Garden", "tomatoes"),
        ])
        .await;

        let results = service.search("garden", None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Garden");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_snippet_highlights_content() {
        let (service, _) = setup(&[("Log", "the deployment finished late")]).await;

        let results = service.search("deploy", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].snippet.contains("<mark>deployment</mark>"));
    }

    #[tokio::test]
    async fn test_word_prefixes_match_unstemmed() {
        let (service, _) = setup(&[
            ("Deployment plan", ""),
            ("Company party", ""),
            ("Ordinary day", ""),
        ])
        .await;

        for (query, title) in [
            ("deploy", "Deployment plan"),
            ("dep", "Deployment plan"),
            ("compan", "Company party"),
            ("ordinar", "Ordinary day"),
        ] {
            let results = service.search(query, None).await.unwrap();
            let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
            assert_eq!(titles, vec![title], "query {:?}", query);
        }
    }

    #[tokio::test]
    async fn test_only_fts_errors_degrade() {
        let (_, repo) = setup(&[("Anything", "")]).await;
        let mut conn = repo.acquire().await.unwrap();

        let syntax = Repository::search_index(&mut conn, "AND", 10).await.unwrap_err();
        assert!(is_rejected_query(&syntax));

        let missing_table = sqlx::query("SELECT * FROM no_such_table")
            .execute(&mut *conn)
            .await
            .unwrap_err();
        assert!(matches!(missing_table, sqlx::Error::Database(_)));
        assert!(!is_rejected_query(&missing_table));

        assert!(!is_rejected_query(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_empty_and_symbol_queries() {
        let (service, _) = setup(&[("Anything", "")]).await;

        assert!(service.search("", None).await.unwrap().is_empty());
        assert!(service.search("   ", None).await.unwrap().is_empty());
        assert!(service.search("\"*(", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_follows_writes_and_trash() {
        let (service, repo) = setup(&[]).await;
        let notes = NotesService::new(repo.clone());

        let note = notes
            .create_note(crate::database::CreateNoteRequest {
                title: "Quarterly".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(service.search("quarter", None).await.unwrap().len(), 1);

        notes
            .update_note(
                &note.id,
                UpdateNoteRequest {
                    title: Some("Annual".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(service.search("quarter", None).await.unwrap().is_empty());
        assert_eq!(service.search("annual", None).await.unwrap().len(), 1);

        notes.trash_note(&note.id, false).await.unwrap();
        assert!(service.search("annual", None).await.unwrap().is_empty());

        let mut conn = repo.acquire().await.unwrap();
        assert_eq!(Repository::index_match_count(&mut conn, "\"annual\"*").await.unwrap(), 1);
        drop(conn);

        notes.trash_note(&note.id, true).await.unwrap();
        let mut conn = repo.acquire().await.unwrap();
        assert_eq!(Repository::index_match_count(&mut conn, "\"annual\"*").await.unwrap(), 0);
    }
}
