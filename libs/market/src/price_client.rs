use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

pub const DEFAULT_BASE_API: &str = "https://api.coingecko.com/api/v3";
pub const QUOTE_CURRENCY: &str = "eur";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Symbols that can be quoted, paired with the provider's coin id.
pub const SUPPORTED_SYMBOLS: [(&str, &str); 3] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
];

/// Provider id for a supported symbol, case-insensitive.
pub fn provider_id(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.trim().to_uppercase();
    SUPPORTED_SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, id)| *id)
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price in [`QUOTE_CURRENCY`]. Any failure, including an
    /// unsupported symbol, is reported as `None`.
    async fn get_price(&self, symbol: &str) -> Option<f64>;
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
}

impl PriceClient {
    pub fn new(base_api: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_api, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_api: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_api: base_api.into(),
        })
    }

    /// Single quote for a provider id. No retry: the next cycle is the retry.
    pub async fn fetch_price(&self, id: &str) -> Result<f64> {
        let url = format!("{}/simple/price", self.base_api.trim_end_matches('/'));

        let res: QuoteResponse = self
            .client
            .get(url)
            .query(&[("ids", id), ("vs_currencies", QUOTE_CURRENCY)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        quote_from(&res, id).with_context(|| format!("no {QUOTE_CURRENCY} quote for {id}"))
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn get_price(&self, symbol: &str) -> Option<f64> {
        let Some(id) = provider_id(symbol) else {
            debug!(symbol, "unsupported symbol");
            return None;
        };

        match self.fetch_price(id).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(symbol, error = ?e, "fetch_price failed");
                None
            }
        }
    }
}

//
// Shape of /simple/price: {"bitcoin": {"eur": 51000.0}}
//
type QuoteResponse = HashMap<String, HashMap<String, f64>>;

fn quote_from(res: &QuoteResponse, id: &str) -> Option<f64> {
    res.get(id)?.get(QUOTE_CURRENCY).copied()
}

/// Quotes every supported symbol, dropping the ones that came back empty.
pub async fn current_prices(source: &dyn PriceSource) -> BTreeMap<String, f64> {
    let mut prices = BTreeMap::new();

    for (symbol, _) in SUPPORTED_SYMBOLS {
        if let Some(price) = source.get_price(symbol).await {
            prices.insert(symbol.to_string(), price);
        }
    }

    prices
}
