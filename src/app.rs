use std::path::PathBuf;

use chrono::Utc;

use crate::config::Config;
use crate::db::{ItemStore, RetentionPolicy};
use crate::error::Result;
use crate::feed::{write_feed, FeedRenderer};
use crate::models::Item;
use crate::timeline::{Cursor, TimelineClient, TimelineSource};

/// Where a rendered feed goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutput {
    File(PathBuf),
    Stdout,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// When false the store is not refreshed; the feed is rebuilt from what
    /// is already archived.
    pub fetch: bool,
    pub output: FeedOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rendered { fetched: usize, inserted: usize, items: usize },
    Skipped,
}

/// One ingestion and render cycle over the item store.
///
/// Runs must not overlap: the store has a single writer, and a second run
/// reading the cursor mid-write would fetch the same items again.
pub struct App<S> {
    store: ItemStore,
    source: S,
    renderer: FeedRenderer,
    initial_fetch_count: u32,
}

impl App<TimelineClient> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = TimelineClient::new(&config.timeline)?;
        Ok(Self::new(config, source))
    }
}

impl<S: TimelineSource> App<S> {
    pub fn new(config: &Config, source: S) -> Self {
        let store = ItemStore::new(
            &config.db_path,
            RetentionPolicy::from_hours(config.retention_hours),
        );
        Self {
            store,
            source,
            renderer: FeedRenderer::new(&config.feed),
            initial_fetch_count: config.initial_fetch_count,
        }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunOutcome> {
        tracing::info!("Generating feed at {}", Utc::now());

        tracing::debug!("Using item store {}", self.store.path().display());
        self.store.initialize().await?;

        let (fetched, inserted) = if options.fetch {
            match self.ingest().await? {
                Some(counts) => counts,
                None => return Ok(RunOutcome::Skipped),
            }
        } else {
            (0, 0)
        };

        let items = self.store.read_all().await?;
        let document = self.renderer.render(&items, Utc::now());

        match &options.output {
            FeedOutput::File(path) => {
                write_feed(path, &document).await?;
                tracing::info!("Wrote {} items to {}", items.len(), path.display());
            }
            FeedOutput::Stdout => print!("{}", document),
        }

        Ok(RunOutcome::Rendered {
            fetched,
            inserted,
            items: items.len(),
        })
    }

    /// Fetch everything past the stored watermark and archive it.
    /// Returns `None` when the timeline could not be fetched.
    async fn ingest(&self) -> Result<Option<(usize, usize)>> {
        let cursor = Cursor::from_highest_id(self.store.highest_id().await?);
        let request = cursor.request(self.initial_fetch_count);
        tracing::info!("Last stored item: {}; requesting {:?}", cursor, request);

        let records = match self.source.fetch_since(request).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("{}; nothing new this run", e);
                return Ok(None);
            }
        };

        let fetched = records.len();
        let items: Vec<Item> = records.into_iter().map(Item::from).collect();

        let inserted = match self.store.write_batch(items).await {
            Ok(report) => {
                if !report.is_complete() {
                    tracing::warn!(
                        "Stored {} of {} items; {} rejected",
                        report.inserted,
                        report.attempted(),
                        report.failures.len()
                    );
                }
                report.inserted
            }
            Err(e) => {
                tracing::error!("Could not write new items: {}", e);
                0
            }
        };

        tracing::info!("Fetched {} items, stored {}", fetched, inserted);
        Ok(Some((fetched, inserted)))
    }
}
