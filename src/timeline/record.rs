use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::models::Item;

const PERMALINK_BASE: &str = "https://twitter.com";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("link pattern is valid"));

/// A status as returned by the home timeline endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    #[serde(with = "status_date")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub user: RawUser,
    #[serde(default)]
    pub entities: RawEntities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub profile_image_url_https: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntities {
    #[serde(default)]
    pub urls: Vec<RawUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUrl {
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl RawRecord {
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }

    pub fn permalink(&self) -> String {
        format!(
            "{}/{}/status/{}",
            PERMALINK_BASE, self.user.screen_name, self.id
        )
    }

    /// Links from the record's entities, falling back to scanning the body.
    pub fn links(&self) -> Vec<String> {
        let from_entities: Vec<String> = self
            .entities
            .urls
            .iter()
            .filter_map(|u| u.expanded_url.clone().or_else(|| u.url.clone()))
            .collect();

        if from_entities.is_empty() {
            extract_links(self.body())
        } else {
            from_entities
        }
    }
}

impl From<RawRecord> for Item {
    fn from(record: RawRecord) -> Self {
        let source_url = record.permalink();
        let extracted_links = Item::join_links(record.links());
        let body_text = record.body().to_string();
        let author_image_url = record
            .user
            .profile_image_url_https
            .or(record.user.profile_image_url)
            .unwrap_or_default();

        Item {
            id: record.id,
            source_url,
            author_name: record.user.name,
            author_handle: record.user.screen_name,
            author_image_url,
            body_text,
            extracted_links,
            created_at: record.created_at,
        }
    }
}

/// Find http(s) URLs in free text.
pub fn extract_links(text: &str) -> Vec<String> {
    LINK_RE
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ')', '!', '?', ';', ':', '\''])
                .to_string()
        })
        .collect()
}

/// `created_at` values look like `Wed Oct 10 20:19:24 +0000 2018`.
mod status_date {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    const FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&s, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&s))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
