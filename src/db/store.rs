use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Item, WriteReport};

use super::retention::RetentionPolicy;
use super::sanitize::sanitize_text;
use super::schema::{ITEMS_TABLE, SCHEMA};

/// SQLite-backed archive of timeline items.
///
/// Every operation opens its own connection and drops it before returning, so
/// an interrupted run never leaves a connection or lock behind.
pub struct ItemStore {
    db_path: PathBuf,
    retention: RetentionPolicy,
}

impl ItemStore {
    pub fn new(db_path: impl Into<PathBuf>, retention: RetentionPolicy) -> Self {
        Self {
            db_path: db_path.into(),
            retention,
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> tokio_rusqlite::Result<Connection> {
        Connection::open(&self.db_path).await
    }

    /// Creates the item table if it does not exist yet.
    pub async fn initialize(&self) -> Result<()> {
        let conn = self
            .connect()
            .await
            .map_err(|e| AppError::StoreInit(format!("{}: {}", self.db_path.display(), e)))?;

        let created = conn
            .call(|conn| {
                let exists: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![ITEMS_TABLE],
                    |row| row.get(0),
                )?;
                conn.execute_batch(SCHEMA)?;
                Ok(exists == 0)
            })
            .await
            .map_err(|e| AppError::StoreInit(e.to_string()))?;

        if created {
            tracing::info!("Created item table in {}", self.db_path.display());
        }
        Ok(())
    }

    /// Highest stored item id, or `None` when the store is empty.
    pub async fn highest_id(&self) -> Result<Option<i64>> {
        let conn = self.connect().await.map_err(read_error)?;
        let max_id = conn
            .call(|conn| {
                let max_id: Option<i64> =
                    conn.query_row("SELECT MAX(id) FROM rssitems", [], |row| row.get(0))?;
                Ok(max_id)
            })
            .await
            .map_err(read_error)?;
        Ok(max_id)
    }

    /// Deletes items created at or before the retention cutoff for `now`.
    /// Called from `read_all_at` so every read sees a freshly purged store.
    pub async fn purge_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = self.retention.cutoff(now).timestamp();
        let conn = self.connect().await.map_err(purge_error)?;
        let deleted = conn
            .call(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM rssitems WHERE created_at <= ?1", params![cutoff])?;
                Ok(deleted)
            })
            .await
            .map_err(purge_error)?;

        if deleted > 0 {
            tracing::info!(
                "Purged {} items older than {} hours",
                deleted,
                self.retention.hours()
            );
        }
        Ok(deleted)
    }

    /// Inserts each item on its own. A rejected item (for example an id that
    /// is already stored) is recorded in the report and the batch carries on.
    pub async fn write_batch(&self, items: Vec<Item>) -> Result<WriteReport> {
        if items.is_empty() {
            return Ok(WriteReport::default());
        }

        let rows: Vec<Item> = items.into_iter().map(sanitize_item).collect();
        let conn = self.connect().await?;

        let outcomes = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"INSERT INTO rssitems (id, url, author_name, author_handle, author_image_url,
                                             body_text, extracted_links, created_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                )?;

                let outcomes = rows
                    .iter()
                    .map(|item| {
                        let result = stmt.execute(params![
                            item.id,
                            item.source_url,
                            item.author_name,
                            item.author_handle,
                            item.author_image_url,
                            item.body_text,
                            item.extracted_links,
                            item.created_at.timestamp(),
                        ]);
                        (item.id, result.err().map(describe_write_error))
                    })
                    .collect::<Vec<_>>();
                Ok(outcomes)
            })
            .await?;

        let mut report = WriteReport::default();
        for (id, failure) in outcomes {
            match failure {
                None => report.inserted += 1,
                Some(reason) => {
                    tracing::warn!("Skipping item {}: {}", id, reason);
                    report.failures.push(AppError::StoreWrite { id, reason });
                }
            }
        }
        Ok(report)
    }

    pub async fn read_all(&self) -> Result<Vec<Item>> {
        self.read_all_at(Utc::now()).await
    }

    /// Purges expired items, then returns the rest oldest first.
    ///
    /// A failed purge is logged and the read still happens; the caller only
    /// risks seeing items that should already have expired.
    pub async fn read_all_at(&self, now: DateTime<Utc>) -> Result<Vec<Item>> {
        if let Err(e) = self.purge_at(now).await {
            tracing::warn!("{}", e);
        }

        let conn = self.connect().await.map_err(read_error)?;
        let items = conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, url, author_name, author_handle, author_image_url,
                              body_text, extracted_links, created_at
                       FROM rssitems
                       ORDER BY created_at ASC, id ASC"#,
                )?;
                let items = stmt
                    .query_map([], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .map_err(read_error)?;
        Ok(items)
    }

    #[cfg(test)]
    pub async fn count(&self) -> Result<usize> {
        let conn = self.connect().await.map_err(read_error)?;
        let count = conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM rssitems", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(read_error)?;
        Ok(count.max(0) as usize)
    }
}

fn read_error(e: tokio_rusqlite::Error) -> AppError {
    AppError::StoreRead(e.to_string())
}

fn purge_error(e: tokio_rusqlite::Error) -> AppError {
    AppError::Purge(e.to_string())
}

fn describe_write_error(e: rusqlite::Error) -> String {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => format!("duplicate id ({})", e),
        _ => e.to_string(),
    }
}

fn sanitize_item(item: Item) -> Item {
    Item {
        id: item.id,
        source_url: sanitize_text(&item.source_url),
        author_name: sanitize_text(&item.author_name),
        author_handle: sanitize_text(&item.author_handle),
        author_image_url: sanitize_text(&item.author_image_url),
        body_text: sanitize_text(&item.body_text),
        extracted_links: sanitize_text(&item.extracted_links),
        created_at: item.created_at,
    }
}

fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
    let created_secs: i64 = row.get(7)?;
    let created_at = DateTime::from_timestamp(created_secs, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(7, created_secs))?;

    Ok(Item {
        id: row.get(0)?,
        source_url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        author_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        author_handle: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        author_image_url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        body_text: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        extracted_links: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn item(id: i64, created_secs: i64) -> Item {
        Item {
            id,
            source_url: format!("https://twitter.com/someone/status/{}", id),
            author_name: "Some One".to_string(),
            author_handle: "someone".to_string(),
            author_image_url: "https://pbs.twimg.com/profile_images/1/a.jpg".to_string(),
            body_text: format!("item number {}", id),
            extracted_links: String::new(),
            created_at: at(created_secs),
        }
    }

    async fn test_store(hours: u32) -> (TempDir, ItemStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ItemStore::new(
            dir.path().join("items.sqlite"),
            RetentionPolicy::from_hours(hours),
        );
        store.initialize().await.expect("Failed to initialize store");
        (dir, store)
    }

    #[tokio::test]
    async fn test_initialize_is_repeatable() {
        let (_dir, store) = test_store(8).await;
        store.write_batch(vec![item(1, 1_000)]).await.unwrap();

        assert_ok!(store.initialize().await);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_initialize_fails_for_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = ItemStore::new(
            dir.path().join("missing").join("nested").join("items.sqlite"),
            RetentionPolicy::from_hours(8),
        );

        let err = assert_err!(store.initialize().await);
        assert!(matches!(err, AppError::StoreInit(_)));
    }

    #[tokio::test]
    async fn test_highest_id_on_empty_store_is_none() {
        let (_dir, store) = test_store(8).await;
        assert_eq!(store.highest_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_highest_id_never_decreases() {
        let (_dir, store) = test_store(8).await;

        store.write_batch(vec![item(10, 100), item(42, 200)]).await.unwrap();
        assert_eq!(store.highest_id().await.unwrap(), Some(42));

        store.write_batch(vec![item(7, 300)]).await.unwrap();
        assert_eq!(store.highest_id().await.unwrap(), Some(42));

        store.write_batch(vec![item(50, 400)]).await.unwrap();
        assert_eq!(store.highest_id().await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn test_duplicate_in_batch_is_reported_not_fatal() {
        let (_dir, store) = test_store(8).await;
        let mut duplicate = item(1, 150);
        duplicate.body_text = "a second copy".to_string();

        let report = store
            .write_batch(vec![item(1, 100), duplicate, item(2, 200)])
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_complete());
        assert!(matches!(
            report.failures[0],
            AppError::StoreWrite { id: 1, .. }
        ));
        assert_eq!(store.count().await.unwrap(), 2);

        let items = store.read_all_at(at(300)).await.unwrap();
        assert_eq!(items[0].body_text, "item number 1");
        assert_eq!(items[0].created_at, at(100));
    }

    #[tokio::test]
    async fn test_rewriting_same_batch_keeps_one_row_per_id() {
        let (_dir, store) = test_store(8).await;
        let batch = vec![item(3, 100), item(4, 200)];

        assert!(store.write_batch(batch.clone()).await.unwrap().is_complete());
        let second = store.write_batch(batch).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.attempted(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purge_drops_items_at_or_before_cutoff() {
        let (_dir, store) = test_store(1).await;
        let now = at(10_000);
        store
            .write_batch(vec![
                item(1, 10_000 - 7200),
                item(2, 10_000 - 3600),
                item(3, 10_000 - 3599),
                item(4, 10_000),
            ])
            .await
            .unwrap();

        assert_eq!(store.purge_at(now).await.unwrap(), 2);

        let ids: Vec<i64> = store.read_all_at(now).await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_read_all_purges_before_reading() {
        // cutoff lands on t=300
        let (_dir, store) = test_store(1).await;
        store.write_batch(vec![item(5, 100), item(9, 500)]).await.unwrap();

        let items = store.read_all_at(at(300 + 3600)).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 9);
    }

    #[tokio::test]
    async fn test_zero_hour_retention_empties_store() {
        let (_dir, store) = test_store(0).await;
        store.write_batch(vec![item(1, 100), item(2, 200)]).await.unwrap();

        assert!(store.read_all_at(at(200)).await.unwrap().is_empty());
        assert_eq!(store.highest_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_huge_retention_window_keeps_everything() {
        let (_dir, store) = test_store(u32::MAX).await;
        store.write_batch(vec![item(1, 0), item(2, 100)]).await.unwrap();

        assert_eq!(store.purge_at(Utc::now()).await.unwrap(), 0);
        assert_eq!(store.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_purge_still_serves_read() {
        let (_dir, store) = test_store(1).await;
        store.write_batch(vec![item(5, 100), item(9, 500)]).await.unwrap();

        let conn = Connection::open(store.path()).await.unwrap();
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER block_delete BEFORE DELETE ON rssitems
                 BEGIN SELECT RAISE(ABORT, 'deletes disabled'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let now = at(300 + 3600);
        let err = assert_err!(store.purge_at(now).await);
        assert!(matches!(err, AppError::Purge(_)));

        let ids: Vec<i64> = store.read_all_at(now).await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5, 9]);
    }

    #[tokio::test]
    async fn test_highest_id_on_broken_table_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ItemStore::new(dir.path().join("items.sqlite"), RetentionPolicy::from_hours(8));
        let conn = Connection::open(store.path()).await.unwrap();
        conn.call(|conn| {
            conn.execute_batch("CREATE TABLE rssitems (created_at INTEGER);")?;
            Ok(())
        })
        .await
        .unwrap();

        assert_ok!(store.initialize().await);
        let err = assert_err!(store.highest_id().await);
        assert!(matches!(err, AppError::StoreRead(_)));
    }

    #[tokio::test]
    async fn test_read_all_orders_by_creation_time() {
        let (_dir, store) = test_store(8).await;
        store
            .write_batch(vec![item(30, 300), item(10, 500), item(20, 100), item(40, 300)])
            .await
            .unwrap();

        let ids: Vec<i64> = store
            .read_all_at(at(600))
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![20, 30, 40, 10]);
    }

    #[tokio::test]
    async fn test_text_fields_are_sanitized_and_quotes_kept() {
        let (_dir, store) = test_store(8).await;
        let mut dirty = item(1, 100);
        dirty.body_text = "it's\u{0} a 'test'\u{7}; DROP TABLE rssitems; --".to_string();
        dirty.author_name = "O'Brien\u{1b}".to_string();
        dirty.extracted_links = "https://a.example/\u{8}x".to_string();

        assert!(store.write_batch(vec![dirty]).await.unwrap().is_complete());

        let items = store.read_all_at(at(200)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].body_text, "it's a 'test'; DROP TABLE rssitems; --");
        assert_eq!(items[0].author_name, "O'Brien");
        assert_eq!(items[0].extracted_links, "https://a.example/x");
    }

    #[tokio::test]
    async fn test_empty_links_stored_as_empty_string() {
        let (_dir, store) = test_store(8).await;
        store.write_batch(vec![item(1, 100)]).await.unwrap();

        let conn = Connection::open(store.path()).await.unwrap();
        let links: Option<String> = conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT extracted_links FROM rssitems WHERE id = 1",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(links.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_created_at_stored_as_unix_seconds() {
        let (_dir, store) = test_store(8).await;
        store.write_batch(vec![item(1, 1_700_000_000)]).await.unwrap();

        let conn = Connection::open(store.path()).await.unwrap();
        let stored: i64 = conn
            .call(|conn| {
                Ok(conn.query_row("SELECT created_at FROM rssitems WHERE id = 1", [], |row| {
                    row.get(0)
                })?)
            })
            .await
            .unwrap();
        assert_eq!(stored, 1_700_000_000);
    }
}
