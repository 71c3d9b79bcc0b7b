use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Separator used when joining the links found in an item's body.
pub const LINK_SEPARATOR: &str = ", ";

/// One archived timeline entry. Items are written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub source_url: String,
    pub author_name: String,
    pub author_handle: String,
    pub author_image_url: String,
    pub body_text: String,
    /// Joined with [`LINK_SEPARATOR`]; empty when the body has no links.
    pub extracted_links: String,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.extracted_links
            .split(LINK_SEPARATOR)
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    pub fn join_links<I, S>(links: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        links
            .into_iter()
            .filter(|l| !l.as_ref().trim().is_empty())
            .map(|l| l.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join(LINK_SEPARATOR)
    }
}

/// Outcome of a batch write. Failed items are reported individually and do
/// not undo the items that were stored.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub inserted: usize,
    pub failures: Vec<AppError>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.inserted + self.failures.len()
    }
}
