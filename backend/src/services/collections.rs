//! Folders, projects and tags
//!
//! Minimal stores for the entities notes reference. Deleting a folder or a
//! project never deletes notes; their reference is cleared instead.

use crate::database::{Folder, Project, Repository, Tag};
use crate::error::{AppError, Result};

/// Service for note collections
#[derive(Clone)]
pub struct CollectionsService {
    repo: Repository,
}

impl CollectionsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new folder
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Folder> {
        tracing::info!("Creating folder: {}", name);

        let mut tx = self.repo.begin_write().await?;
        if let Some(parent_id) = parent_id {
            if !Repository::folder_exists(&mut tx, parent_id).await? {
                return Err(AppError::NotFound(format!("Folder {}", parent_id)));
            }
        }
        let folder = Repository::create_folder(&mut tx, name, parent_id).await?;
        tx.commit().await?;

        Ok(folder)
    }

    pub async fn delete_folder(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting folder: {}", id);

        let mut tx = self.repo.begin_write().await?;
        if !Repository::delete_folder(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Folder {}", id)));
        }
        tx.commit().await
    }

    pub async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        tracing::info!("Creating project: {}", name);

        let mut tx = self.repo.begin_write().await?;
        let project = Repository::create_project(&mut tx, name, description).await?;
        tx.commit().await?;

        Ok(project)
    }

    pub async fn delete_project(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting project: {}", id);

        let mut tx = self.repo.begin_write().await?;
        if !Repository::delete_project(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Project {}", id)));
        }
        tx.commit().await
    }

    /// Create a tag; names are unique
    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("tag name cannot be empty"));
        }

        let mut tx = self.repo.begin_write().await?;
        let tag = Repository::create_tag(&mut tx, name, color).await?;
        tx.commit().await?;

        Ok(tag)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut conn = self.repo.acquire().await?;
        Repository::list_tags(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_pool, CreateNoteRequest};
    use crate::error::ErrorKind;
    use crate::services::NotesService;

    async fn setup() -> (CollectionsService, NotesService) {
        let repo = Repository::new(memory_pool().await);
        (CollectionsService::new(repo.clone()), NotesService::new(repo))
    }

    #[tokio::test]
    async fn test_duplicate_tag_is_conflict() {
        let (service, _) = setup().await;

        let tag = service.create_tag("work", None).await.unwrap();
        assert_eq!(tag.color, "#6366f1");

        let err = service.create_tag(" work ", Some("#000000")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(service.list_tags().await.unwrap().len(), 1);
        assert!(service.create_tag("  ", None).await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_folder_and_project_keeps_notes() {
        let (service, notes) = setup().await;

        let folder = service.create_folder("Inbox", None).await.unwrap();
        let project = service.create_project("Launch", Some("Q3")).await.unwrap();

        let note = notes
            .create_note(CreateNoteRequest {
                title: "Plan".into(),
                folder_id: Some(folder.id.clone()),
                project_id: Some(project.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        service.delete_folder(&folder.id).await.unwrap();
        service.delete_project(&project.id).await.unwrap();

        let fetched = notes.get_note(&note.id).await.unwrap();
        assert!(fetched.folder_id.is_none());
        assert!(fetched.project_id.is_none());

        assert!(service.delete_folder(&folder.id).await.is_err());
    }

    #[tokio::test]
    async fn test_subfolder_needs_parent() {
        let (service, _) = setup().await;
        let err = service.create_folder("Child", Some("missing")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
