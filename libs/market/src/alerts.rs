use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::{debug, error, info};

use crate::{
    notify::{NotificationSink, SEND_TIMEOUT, send_within},
    price_client::PriceSource,
    state::SharedState,
    state_store::Alert,
};

/// An alert whose condition held at `price`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertHit {
    pub alert: Alert,
    pub price: f64,
}

impl AlertHit {
    pub fn message(&self) -> String {
        format!(
            "🚨 {} is at {:.2}€ (condition {} {}€)",
            self.alert.symbol, self.price, self.alert.operator, self.alert.price
        )
    }
}

/// Checks every stored alert against the current price.
///
/// By default an alert fires on every evaluation for as long as its condition
/// holds; it is never disabled or removed here. With
/// [`AlertEvaluator::suppress_repeats`] an alert fires once when it becomes
/// true and re-arms after an evaluation where it is observed false.
pub struct AlertEvaluator {
    prices: Arc<dyn PriceSource>,
    suppress_repeats: bool,
    send_timeout: Duration,
    fired: Mutex<HashSet<u64>>,
}

impl AlertEvaluator {
    pub fn new(prices: Arc<dyn PriceSource>) -> Self {
        Self {
            prices,
            suppress_repeats: false,
            send_timeout: SEND_TIMEOUT,
            fired: Mutex::new(HashSet::new()),
        }
    }

    pub fn suppress_repeats(mut self, suppress: bool) -> Self {
        self.suppress_repeats = suppress;
        self
    }

    pub fn send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    pub async fn evaluate(&self, alerts: &[Alert]) -> Vec<AlertHit> {
        // one quote per symbol per cycle
        let mut quotes: HashMap<String, Option<f64>> = HashMap::new();
        let mut hits = Vec::new();

        for alert in alerts {
            let symbol = alert.symbol.trim().to_uppercase();
            let price = match quotes.get(&symbol) {
                Some(price) => *price,
                None => {
                    let price = self.prices.get_price(&symbol).await;
                    quotes.insert(symbol, price);
                    price
                }
            };

            let Some(price) = price else {
                debug!(alert_id = alert.id, symbol = %alert.symbol, "no price, skipping alert");
                continue;
            };

            let triggered = alert.is_triggered(price);
            let fire = if self.suppress_repeats {
                self.first_trigger(alert.id, triggered)
            } else {
                triggered
            };

            if fire {
                hits.push(AlertHit {
                    alert: alert.clone(),
                    price,
                });
            }
        }

        hits
    }

    /// Evaluates the stored alerts and sends one message per hit. Returns how
    /// many messages were delivered; failed deliveries are logged and dropped.
    pub async fn run(&self, state: &SharedState, sink: &dyn NotificationSink) -> usize {
        let alerts = state.alerts().await;
        let hits = self.evaluate(&alerts).await;

        let mut delivered = 0;
        for hit in &hits {
            match send_within(sink, self.send_timeout, &hit.message(), None).await {
                Ok(_) => delivered += 1,
                Err(e) => error!(alert_id = hit.alert.id, error = ?e, "alert delivery failed"),
            }
        }

        info!(
            alerts = alerts.len(),
            fired = hits.len(),
            delivered,
            "alert check complete"
        );
        delivered
    }

    fn first_trigger(&self, id: u64, triggered: bool) -> bool {
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        if triggered {
            fired.insert(id)
        } else {
            fired.remove(&id);
            false
        }
    }
}
