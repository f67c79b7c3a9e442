//! Application state and initialization
//!
//! All services are initialized here over one shared repository and made
//! available through AppState.

use crate::config::Config;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    CollectionsService, DailyService, GraphService, LinksService, NotesService, RemindersService,
    SearchService, VersionsService,
};
use sqlx::SqlitePool;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub notes: NotesService,
    pub daily: DailyService,
    pub links: LinksService,
    pub versions: VersionsService,
    pub search: SearchService,
    pub graph: GraphService,
    pub reminders: RemindersService,
    pub collections: CollectionsService,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let repo = Repository::new(pool);

        Self {
            notes: NotesService::new(repo.clone()),
            daily: DailyService::new(repo.clone()),
            links: LinksService::new(repo.clone()),
            versions: VersionsService::new(repo.clone()),
            search: SearchService::new(repo.clone()),
            graph: GraphService::new(repo.clone()),
            reminders: RemindersService::new(repo.clone()),
            collections: CollectionsService::new(repo),
        }
    }

    /// Open (creating if needed) the configured database and wire the services
    pub async fn initialize(config: &Config) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", config.data_dir);

        std::fs::create_dir_all(&config.data_dir)?;

        let pool = create_pool(&config.database_path()).await?;

        tracing::info!("Application initialized successfully");

        Ok(Self::new(pool))
    }
}
