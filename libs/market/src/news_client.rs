use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

pub const DEFAULT_FEEDS: [&str; 2] = [
    "https://www.coindesk.com/arc/outboundfeeds/rss/",
    "https://cointelegraph.com/rss",
];

/// Entries kept from the top of each feed.
pub const HEADLINES_PER_FEED: usize = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub summary: Option<String>,
    pub link: Option<String>,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fresh fetch across every feed. A feed that fails contributes nothing.
    async fn get_headlines(&self) -> Vec<Headline>;
}

#[derive(Clone)]
pub struct NewsClient {
    client: Client,
    feeds: Vec<String>,
}

impl NewsClient {
    pub fn new(feeds: Vec<String>) -> Result<Self> {
        Self::with_timeout(feeds, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(feeds: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, feeds })
    }

    pub fn feeds(&self) -> &[String] {
        &self.feeds
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<Headline>> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        parse_feed(&body, HEADLINES_PER_FEED)
    }
}

#[async_trait]
impl NewsSource for NewsClient {
    async fn get_headlines(&self) -> Vec<Headline> {
        let mut headlines = Vec::new();

        for url in &self.feeds {
            match self.fetch_feed(url).await {
                Ok(items) => {
                    debug!(feed = %url, items = items.len(), "fetched feed");
                    headlines.extend(items);
                }
                Err(e) => warn!(feed = %url, error = ?e, "fetch_feed failed"),
            }
        }

        headlines
    }
}

/// Parses an RSS or Atom document, keeping the first `limit` titled entries.
pub fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<Headline>> {
    let feed = feed_rs::parser::parse(body).context("malformed feed")?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title?.content.trim().to_string();
            if title.is_empty() {
                return None;
            }

            Some(Headline {
                title,
                summary: entry.summary.map(|s| s.content),
                link: entry.links.into_iter().next().map(|l| l.href),
            })
        })
        .take(limit)
        .collect())
}
