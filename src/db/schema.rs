pub const SCHEMA: &str = r#"
-- Pictures: one row per indexed image file
CREATE TABLE IF NOT EXISTS pictures (
    path TEXT PRIMARY KEY NOT NULL,
    filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,   -- RFC 3339, nanosecond precision
    indexed_at TEXT NOT NULL,
    thumbnail_path TEXT
);

-- Tags: name is the identity, case-sensitive
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY NOT NULL,
    category TEXT NOT NULL,      -- 'person', 'location', 'event', 'other'
    color TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tags_category ON tags(category);

-- Picture to tag membership
CREATE TABLE IF NOT EXISTS picture_tags (
    picture_path TEXT NOT NULL,
    tag_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (picture_path, tag_name)
);

CREATE INDEX IF NOT EXISTS idx_picture_tags_tag ON picture_tags(tag_name);

-- Folders registered for repeated indexing
CREATE TABLE IF NOT EXISTS watched_folders (
    path TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    added_at TEXT NOT NULL,
    last_indexed_at TEXT,
    picture_count INTEGER NOT NULL DEFAULT 0,
    auto_reindex INTEGER NOT NULL DEFAULT 0
);
"#;
