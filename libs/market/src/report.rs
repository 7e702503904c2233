use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    news_client::{Headline, NewsSource},
    notify::{NotificationSink, SEND_TIMEOUT, send_within},
    price_client::{PriceSource, SUPPORTED_SYMBOLS, current_prices},
    state::SharedState,
    state_store::StoreError,
};

/// Headlines quoted in the synthesis block.
pub const SYNTHESIS_HEADLINES: usize = 3;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum ReportError {
    /// Nothing was recorded; the next report compares against the same prices.
    #[error("report delivery failed: {0:#}")]
    Delivery(anyhow::Error),

    /// Every message went out but `last_prices` could not be saved.
    #[error("report sent but state was not saved: {0}")]
    Persistence(#[from] StoreError),
}

/// Percentage move from `previous` to `current`. A zero previous price has no
/// meaningful delta.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// `BTC 105€ (+5.0%)`, or `BTC 105€` when there is nothing to compare with.
pub fn format_quote(symbol: &str, price: f64, previous: Option<f64>) -> String {
    match previous.and_then(|p| percent_change(p, price)) {
        Some(delta) => format!("{symbol} {price:.0}€ ({delta:+.1}%)"),
        None => format!("{symbol} {price:.0}€"),
    }
}

/// The three messages of one market report, in sending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub headline: String,
    pub synthesis: String,
    pub details: String,
}

impl Report {
    pub fn build(
        now: &DateTime<Tz>,
        prices: &BTreeMap<String, f64>,
        last_prices: &BTreeMap<String, f64>,
        headlines: &[Headline],
    ) -> Self {
        let stamp = now.format(TIMESTAMP_FORMAT);

        let quotes: Vec<String> = SUPPORTED_SYMBOLS
            .iter()
            .filter_map(|(symbol, _)| {
                let price = prices.get(*symbol)?;
                Some(format_quote(symbol, *price, last_prices.get(*symbol).copied()))
            })
            .collect();
        let headline = format!("📌 {stamp} | {}", quotes.join(" • "));

        let mut synthesis = vec![format!("📈 **Summary – {stamp}**")];
        synthesis.extend(headlines.iter().take(SYNTHESIS_HEADLINES).map(bullet));

        let mut details = vec!["📰 **Detailed news**:".to_string()];
        details.extend(headlines.iter().map(bullet));

        Self {
            headline,
            synthesis: synthesis.join("\n"),
            details: details.join("\n"),
        }
    }
}

// First non-blank line of the title, so one headline is one bullet.
fn bullet(headline: &Headline) -> String {
    let title = headline
        .title
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    format!("• {title}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub quoted: usize,
    pub headlines: usize,
}

pub struct ReportBuilder {
    prices: Arc<dyn PriceSource>,
    news: Arc<dyn NewsSource>,
    timezone: Tz,
    send_timeout: Duration,
}

impl ReportBuilder {
    pub fn new(prices: Arc<dyn PriceSource>, news: Arc<dyn NewsSource>, timezone: Tz) -> Self {
        Self {
            prices,
            news,
            timezone,
            send_timeout: SEND_TIMEOUT,
        }
    }

    pub fn send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    pub async fn run(
        &self,
        state: &SharedState,
        sink: &dyn NotificationSink,
    ) -> Result<ReportSummary, ReportError> {
        let now = Utc::now().with_timezone(&self.timezone);
        self.run_at(now, state, sink).await
    }

    /// Fetches, sends the headline, synthesis and detail blocks (the last one
    /// threaded under the headline), then records the prices seen. Prices are
    /// only recorded once all three messages were accepted.
    pub async fn run_at(
        &self,
        now: DateTime<Tz>,
        state: &SharedState,
        sink: &dyn NotificationSink,
    ) -> Result<ReportSummary, ReportError> {
        let headlines = self.news.get_headlines().await;
        let prices = current_prices(self.prices.as_ref()).await;
        debug!(
            quoted = prices.len(),
            headlines = headlines.len(),
            "report inputs fetched"
        );

        let last_prices = state.last_prices().await;
        let report = Report::build(&now, &prices, &last_prices, &headlines);

        let head = send_within(sink, self.send_timeout, &report.headline, None)
            .await
            .map_err(ReportError::Delivery)?;
        send_within(sink, self.send_timeout, &report.synthesis, None)
            .await
            .map_err(ReportError::Delivery)?;
        send_within(sink, self.send_timeout, &report.details, Some(head))
            .await
            .map_err(ReportError::Delivery)?;

        state.record_prices(&prices).await?;

        let summary = ReportSummary {
            quoted: prices.len(),
            headlines: headlines.len(),
        };
        info!(quoted = summary.quoted, headlines = summary.headlines, "report sent");
        Ok(summary)
    }
}
