//! SQLite backend implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::backend::CatalogStore;
use super::models::{Picture, Tag, TagCategory, TagWithCount, WatchedFolder};
use super::schema::SCHEMA;
use crate::error::{CatalogError, Result};
use crate::tags::query::GroupQuery;

/// Paths resolved per `IN (...)` statement, below SQLite's variable limit.
const PATH_CHUNK: usize = 500;

const PICTURE_COLUMNS: &str = "path, filename, size_bytes, width, height, \
     created_at, modified_at, indexed_at, thumbnail_path";

pub struct SqliteDb {
    conn: Mutex<Option<Connection>>,
    ready: AtomicBool,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            ready: AtomicBool::new(false),
        }
    }

    /// Apply the schema. Until this succeeds the store refuses requests.
    pub fn initialize(&self) -> Result<()> {
        let guard = self.conn.lock().map_err(|_| CatalogError::StoreUnavailable)?;
        let conn = guard.as_ref().ok_or(CatalogError::StoreUnavailable)?;
        conn.execute_batch(SCHEMA)?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Drop the connection; later calls fail with `StoreUnavailable`.
    pub fn close(&self) {
        self.ready.store(false, Ordering::Release);
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(CatalogError::StoreUnavailable);
        }
        let guard = self.conn.lock().map_err(|_| CatalogError::StoreUnavailable)?;
        let conn = guard.as_ref().ok_or(CatalogError::StoreUnavailable)?;
        f(conn)
    }
}

pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_db_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(idx, &raw)
}

fn optional_time_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_db_time(idx, &r)).transpose()
}

fn picture_from_row(row: &Row) -> rusqlite::Result<Picture> {
    Ok(Picture {
        path: row.get(0)?,
        filename: row.get(1)?,
        size_bytes: row.get::<_, i64>(2)? as u64,
        width: row.get::<_, i64>(3)? as u32,
        height: row.get::<_, i64>(4)? as u32,
        created_at: time_column(row, 5)?,
        modified_at: time_column(row, 6)?,
        indexed_at: time_column(row, 7)?,
        thumbnail_path: row.get(8)?,
    })
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    let category: String = row.get(1)?;
    let category = category
        .parse::<TagCategory>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(Tag {
        name: row.get(0)?,
        category,
        color: row.get(2)?,
        created_at: time_column(row, 3)?,
    })
}

fn folder_from_row(row: &Row) -> rusqlite::Result<WatchedFolder> {
    Ok(WatchedFolder {
        path: row.get(0)?,
        name: row.get(1)?,
        added_at: time_column(row, 2)?,
        last_indexed_at: optional_time_column(row, 3)?,
        picture_count: row.get::<_, i64>(4)? as u64,
        auto_reindex: row.get::<_, i64>(5)? == 1,
    })
}

impl CatalogStore for SqliteDb {
    fn ensure_ready(&self) -> Result<()> {
        self.with_conn(|_| Ok(()))
    }

    // ========================================================================
    // Picture operations
    // ========================================================================

    fn find_picture(&self, path: &str) -> Result<Option<Picture>> {
        self.with_conn(|conn| {
            let picture = conn
                .query_row(
                    &format!("SELECT {} FROM pictures WHERE path = ?", PICTURE_COLUMNS),
                    [path],
                    picture_from_row,
                )
                .optional()?;
            Ok(picture)
        })
    }

    fn upsert_picture(&self, picture: &Picture) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO pictures (
                    path, filename, size_bytes, width, height,
                    created_at, modified_at, indexed_at, thumbnail_path
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(path) DO UPDATE SET
                    filename = excluded.filename,
                    size_bytes = excluded.size_bytes,
                    width = excluded.width,
                    height = excluded.height,
                    created_at = excluded.created_at,
                    modified_at = excluded.modified_at,
                    indexed_at = excluded.indexed_at,
                    thumbnail_path = excluded.thumbnail_path
                "#,
                rusqlite::params![
                    picture.path,
                    picture.filename,
                    picture.size_bytes as i64,
                    picture.width as i64,
                    picture.height as i64,
                    to_db_time(&picture.created_at),
                    to_db_time(&picture.modified_at),
                    to_db_time(&picture.indexed_at),
                    picture.thumbnail_path,
                ],
            )?;
            Ok(())
        })
    }

    fn all_pictures(&self) -> Result<Vec<Picture>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM pictures ORDER BY path",
                PICTURE_COLUMNS
            ))?;
            let pictures = stmt
                .query_map([], picture_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(pictures)
        })
    }

    fn pictures_by_paths(&self, paths: &[String]) -> Result<Vec<Picture>> {
        self.with_conn(|conn| {
            let mut pictures = Vec::with_capacity(paths.len());
            for chunk in paths.chunks(PATH_CHUNK) {
                let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
                let sql = format!(
                    "SELECT {} FROM pictures WHERE path IN ({})",
                    PICTURE_COLUMNS,
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(chunk.iter()), picture_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                pictures.extend(rows);
            }
            pictures.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(pictures)
        })
    }

    fn picture_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn delete_picture(&self, path: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM picture_tags WHERE picture_path = ?", [path])?;
            let deleted = tx.execute("DELETE FROM pictures WHERE path = ?", [path])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    // ========================================================================
    // Tag operations
    // ========================================================================

    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        self.with_conn(|conn| {
            let tag = conn
                .query_row(
                    "SELECT name, category, color, created_at FROM tags WHERE name = ?",
                    [name],
                    tag_from_row,
                )
                .optional()?;
            Ok(tag)
        })
    }

    fn insert_tag(&self, tag: &Tag) -> Result<()> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO tags (name, category, color, created_at) VALUES (?, ?, ?, ?)",
                rusqlite::params![
                    tag.name,
                    tag.category.as_str(),
                    tag.color,
                    to_db_time(&tag.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(CatalogError::AlreadyExists(format!("tag '{}'", tag.name)))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn update_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tags SET category = ?, color = ? WHERE name = ?",
                rusqlite::params![category.as_str(), color, name],
            )?;
            Ok(updated > 0)
        })
    }

    fn delete_tag(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM picture_tags WHERE tag_name = ?", [name])?;
            let deleted = tx.execute("DELETE FROM tags WHERE name = ?", [name])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    fn all_tags(&self) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name, category, color, created_at FROM tags ORDER BY name")?;
            let tags = stmt
                .query_map([], tag_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    fn all_tags_with_count(&self) -> Result<Vec<TagWithCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT t.name, t.category, t.color, t.created_at,
                       (SELECT COUNT(*) FROM picture_tags pt WHERE pt.tag_name = t.name)
                FROM tags t
                ORDER BY t.name
                "#,
            )?;
            let tags = stmt
                .query_map([], |row| {
                    Ok(TagWithCount {
                        tag: tag_from_row(row)?,
                        picture_count: row.get::<_, i64>(4)? as u64,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    // ========================================================================
    // Association operations
    // ========================================================================

    fn add_association(&self, picture_path: &str, tag_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO picture_tags (picture_path, tag_name, created_at) VALUES (?, ?, ?)",
                rusqlite::params![picture_path, tag_name, to_db_time(&Utc::now())],
            )?;
            Ok(())
        })
    }

    fn remove_association(&self, picture_path: &str, tag_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM picture_tags WHERE picture_path = ? AND tag_name = ?",
                rusqlite::params![picture_path, tag_name],
            )?;
            Ok(removed > 0)
        })
    }

    fn tags_for_picture(&self, picture_path: &str) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT t.name, t.category, t.color, t.created_at
                FROM tags t
                JOIN picture_tags pt ON pt.tag_name = t.name
                WHERE pt.picture_path = ?
                ORDER BY t.name
                "#,
            )?;
            let tags = stmt
                .query_map([picture_path], tag_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    fn group_paths(&self, group: &GroupQuery) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let (sql, params) = group.to_sql();
            let mut stmt = conn.prepare(&sql)?;
            let paths = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(paths)
        })
    }

    // ========================================================================
    // Watched folder operations
    // ========================================================================

    fn find_watched_folder(&self, path: &str) -> Result<Option<WatchedFolder>> {
        self.with_conn(|conn| {
            let folder = conn
                .query_row(
                    r#"
                    SELECT path, name, added_at, last_indexed_at, picture_count, auto_reindex
                    FROM watched_folders WHERE path = ?
                    "#,
                    [path],
                    folder_from_row,
                )
                .optional()?;
            Ok(folder)
        })
    }

    fn upsert_watched_folder(&self, folder: &WatchedFolder) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO watched_folders (
                    path, name, added_at, last_indexed_at, picture_count, auto_reindex
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(path) DO UPDATE SET
                    name = excluded.name,
                    auto_reindex = excluded.auto_reindex
                "#,
                rusqlite::params![
                    folder.path,
                    folder.name,
                    to_db_time(&folder.added_at),
                    folder.last_indexed_at.as_ref().map(to_db_time),
                    folder.picture_count as i64,
                    folder.auto_reindex as i64,
                ],
            )?;
            Ok(())
        })
    }

    fn update_watched_folder(&self, path: &str, name: &str, auto_reindex: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE watched_folders SET name = ?, auto_reindex = ? WHERE path = ?",
                rusqlite::params![name, auto_reindex as i64, path],
            )?;
            Ok(updated > 0)
        })
    }

    fn record_index_stats(
        &self,
        path: &str,
        indexed_at: DateTime<Utc>,
        picture_count: u64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE watched_folders SET last_indexed_at = ?, picture_count = ? WHERE path = ?",
                rusqlite::params![to_db_time(&indexed_at), picture_count as i64, path],
            )?;
            Ok(updated > 0)
        })
    }

    fn delete_watched_folder(&self, path: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM watched_folders WHERE path = ?", [path])?;
            Ok(deleted > 0)
        })
    }

    fn all_watched_folders(&self) -> Result<Vec<WatchedFolder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT path, name, added_at, last_indexed_at, picture_count, auto_reindex
                FROM watched_folders
                ORDER BY path
                "#,
            )?;
            let folders = stmt
                .query_map([], folder_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(folders)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SqliteDb {
        let db = SqliteDb::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn picture(path: &str) -> Picture {
        let modified = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        Picture {
            path: path.to_string(),
            filename: path.rsplit('/').next().unwrap_or(path).to_string(),
            size_bytes: 1024,
            width: 640,
            height: 480,
            created_at: modified,
            modified_at: modified,
            indexed_at: Utc::now(),
            thumbnail_path: None,
        }
    }

    fn tag(name: &str, category: TagCategory) -> Tag {
        Tag {
            name: name.to_string(),
            category,
            color: "#3B82F6".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_uninitialized_store_is_unavailable() {
        let db = SqliteDb::open_in_memory().unwrap();
        assert!(matches!(db.ensure_ready(), Err(CatalogError::StoreUnavailable)));
        assert!(matches!(db.all_pictures(), Err(CatalogError::StoreUnavailable)));

        db.initialize().unwrap();
        assert!(db.ensure_ready().is_ok());

        db.close();
        assert!(matches!(db.find_tag("x"), Err(CatalogError::StoreUnavailable)));
    }

    #[test]
    fn test_picture_timestamps_round_trip_exactly() {
        let db = store();
        let original = picture("/photos/a.jpg");
        db.upsert_picture(&original).unwrap();

        let loaded = db.find_picture("/photos/a.jpg").unwrap().unwrap();
        assert_eq!(loaded.modified_at, original.modified_at);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_upsert_replaces_mutable_fields() {
        let db = store();
        db.upsert_picture(&picture("/photos/a.jpg")).unwrap();

        let mut changed = picture("/photos/a.jpg");
        changed.width = 10;
        changed.size_bytes = 5;
        changed.thumbnail_path = Some("/thumbs/x.jpg".to_string());
        db.upsert_picture(&changed).unwrap();

        assert_eq!(db.picture_count().unwrap(), 1);
        let loaded = db.find_picture("/photos/a.jpg").unwrap().unwrap();
        assert_eq!(loaded.width, 10);
        assert_eq!(loaded.size_bytes, 5);
        assert_eq!(loaded.thumbnail_path.as_deref(), Some("/thumbs/x.jpg"));
    }

    #[test]
    fn test_duplicate_tag_insert_fails() {
        let db = store();
        db.insert_tag(&tag("Clara", TagCategory::Person)).unwrap();
        let err = db.insert_tag(&tag("Clara", TagCategory::Event)).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(_)));
        // Case-sensitive identity
        db.insert_tag(&tag("clara", TagCategory::Person)).unwrap();
    }

    #[test]
    fn test_delete_tag_removes_associations() {
        let db = store();
        db.upsert_picture(&picture("/photos/a.jpg")).unwrap();
        db.insert_tag(&tag("Paris", TagCategory::Location)).unwrap();
        db.add_association("/photos/a.jpg", "Paris").unwrap();
        db.add_association("/photos/a.jpg", "Paris").unwrap();

        let counts = db.all_tags_with_count().unwrap();
        assert_eq!(counts[0].picture_count, 1);

        assert!(db.delete_tag("Paris").unwrap());
        assert!(!db.delete_tag("Paris").unwrap());
        assert!(db.tags_for_picture("/photos/a.jpg").unwrap().is_empty());
        let paths = db
            .group_paths(&GroupQuery::Union(vec!["Paris".to_string()]))
            .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_pictures_by_paths_ignores_unknown() {
        let db = store();
        db.upsert_picture(&picture("/photos/b.jpg")).unwrap();
        db.upsert_picture(&picture("/photos/a.jpg")).unwrap();

        let paths = vec![
            "/photos/b.jpg".to_string(),
            "/photos/missing.jpg".to_string(),
            "/photos/a.jpg".to_string(),
        ];
        let pictures = db.pictures_by_paths(&paths).unwrap();
        let found: Vec<&str> = pictures.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(found, vec!["/photos/a.jpg", "/photos/b.jpg"]);
    }

    #[test]
    fn test_watched_folder_upsert_keeps_stats() {
        let db = store();
        let folder = WatchedFolder {
            path: "/photos".to_string(),
            name: "photos".to_string(),
            added_at: Utc::now(),
            last_indexed_at: None,
            picture_count: 0,
            auto_reindex: false,
        };
        db.upsert_watched_folder(&folder).unwrap();
        assert!(db.record_index_stats("/photos", Utc::now(), 7).unwrap());

        let renamed = WatchedFolder {
            name: "Holidays".to_string(),
            auto_reindex: true,
            ..folder
        };
        db.upsert_watched_folder(&renamed).unwrap();

        let loaded = db.find_watched_folder("/photos").unwrap().unwrap();
        assert_eq!(loaded.name, "Holidays");
        assert!(loaded.auto_reindex);
        assert_eq!(loaded.picture_count, 7);
        assert!(loaded.last_indexed_at.is_some());
        assert!(!db.record_index_stats("/elsewhere", Utc::now(), 1).unwrap());
    }
}
