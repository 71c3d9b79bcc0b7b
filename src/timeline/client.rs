use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::TimelineConfig;
use crate::error::{AppError, Result};

use super::cursor::FetchRequest;
use super::record::RawRecord;
use super::TimelineSource;

const HOME_TIMELINE_PATH: &str = "statuses/home_timeline.json";

/// HTTP client for a statuses-style home timeline API.
pub struct TimelineClient {
    client: Client,
    api_base: Url,
    bearer_token: Option<String>,
    page_size: u32,
    max_pages: u32,
}

impl TimelineClient {
    pub fn new(config: &TimelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("timeline-rss/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base)
            .map_err(|e| AppError::Config(format!("invalid timeline api_base {}: {}", base, e)))?;

        Ok(Self {
            client,
            api_base,
            bearer_token: config.bearer_token.clone(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
        })
    }

    async fn fetch_page(
        &self,
        count: u32,
        since_id: Option<i64>,
        max_id: Option<i64>,
    ) -> Result<Vec<RawRecord>> {
        let mut url = self
            .api_base
            .join(HOME_TIMELINE_PATH)
            .map_err(|e| AppError::Fetch(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &count.to_string());
            query.append_pair("tweet_mode", "extended");
            if let Some(id) = since_id {
                query.append_pair("since_id", &id.to_string());
            }
            if let Some(id) = max_id {
                query.append_pair("max_id", &id.to_string());
            }
        }

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::Fetch("rate limited by timeline API".to_string()));
            }
            status => {
                return Err(AppError::Fetch(format!("HTTP {}", status)));
            }
        }

        response
            .json::<Vec<RawRecord>>()
            .await
            .map_err(|e| AppError::Fetch(format!("unreadable timeline response: {}", e)))
    }

    /// Walks backwards from the newest page until the API runs out of items
    /// newer than `since_id`.
    async fn fetch_all_since(&self, since_id: i64) -> Result<Vec<RawRecord>> {
        let request = FetchRequest::Since { id: since_id };
        let mut records = Vec::new();
        let mut max_id = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_page(self.page_size, Some(since_id), max_id).await?;
            let Some(oldest) = page.iter().map(|r| r.id).min() else {
                break;
            };
            pages += 1;

            if max_id.is_some_and(|max| oldest > max) {
                tracing::warn!(
                    "Timeline API ignored max_id {:?}; stopping after {} pages",
                    max_id,
                    pages
                );
                break;
            }

            records.extend(page.into_iter().filter(|r| request.wants(r.id)));

            if oldest <= since_id + 1 {
                break;
            }
            if self.max_pages > 0 && pages >= self.max_pages {
                tracing::warn!(
                    "Stopped after {} pages; items between {} and {} may be missing",
                    pages,
                    since_id,
                    oldest
                );
                break;
            }
            max_id = Some(oldest - 1);
        }

        tracing::debug!("Fetched {} pages since {}", pages, since_id);
        Ok(records)
    }
}

impl TimelineSource for TimelineClient {
    async fn fetch_since(&self, request: FetchRequest) -> Result<Vec<RawRecord>> {
        let records = match request {
            FetchRequest::Initial { count } => self.fetch_page(count, None, None).await?,
            FetchRequest::Since { id } => self.fetch_all_since(id).await?,
        };
        tracing::info!("Retrieved {} timeline items", records.len());
        Ok(records)
    }
}
