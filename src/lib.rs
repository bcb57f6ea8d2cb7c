//! Picture catalog: indexes image folders into a SQLite store, manages
//! watched folders and user tags, and answers category-grouped tag searches.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod folders;
pub mod logging;
pub mod scanner;
pub mod tags;

pub use catalog::Catalog;
pub use config::Config;
pub use db::{CatalogStore, Picture, SqliteDb, Tag, TagCategory, TagWithCount, WatchedFolder};
pub use error::{CatalogError, Result};
pub use scanner::{ReindexSummary, ScanProgress, ScanResult, ScanWarning, WatchedIndexOutcome};
pub use tags::{GroupOperator, SearchCriteria, TagCriteria};
