pub const ITEMS_TABLE: &str = "rssitems";

/// The column layout is shared with existing item databases and must not change.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rssitems (
    id INTEGER PRIMARY KEY,
    url TEXT,
    author_name TEXT,
    author_handle TEXT,
    author_image_url TEXT,
    body_text TEXT,
    extracted_links TEXT,
    created_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_rssitems_created_at ON rssitems(created_at);
"#;
