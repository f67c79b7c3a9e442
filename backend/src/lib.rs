//! Everynote library
//!
//! Note content and relationship engine: note lifecycle, wiki-links,
//! version history, recurrence and full-text search over SQLite.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod ids;
pub mod services;
pub mod timestamp;
