//! Services module
//!
//! Business logic services that coordinate between callers and the repository.

pub mod collections;
pub mod daily;
pub mod effects;
pub mod graph;
pub mod links;
pub mod notes;
pub mod recurrence;
pub mod reminders;
pub mod search;
pub mod versions;

pub use collections::CollectionsService;
pub use daily::DailyService;
pub use graph::GraphService;
pub use links::LinksService;
pub use notes::{Completion, NotesService};
pub use reminders::RemindersService;
pub use search::SearchService;
pub use versions::VersionsService;
