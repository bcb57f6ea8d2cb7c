mod schema;
pub mod backend;
pub mod models;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

pub use backend::CatalogStore;
pub use models::{Picture, Tag, TagCategory, TagWithCount, WatchedFolder};
pub use schema::SCHEMA;
pub use sqlite::SqliteDb;

use crate::error::Result;

/// Open the SQLite catalog at `path`, apply the schema and hand back a
/// shareable store.
pub fn open_sqlite(path: &Path) -> Result<Arc<dyn CatalogStore>> {
    let db = SqliteDb::open(path)?;
    db.initialize()?;
    Ok(Arc::new(db))
}

/// In-memory catalog, mostly for tests and dry runs.
pub fn open_in_memory() -> Result<Arc<dyn CatalogStore>> {
    let db = SqliteDb::open_in_memory()?;
    db.initialize()?;
    Ok(Arc::new(db))
}
