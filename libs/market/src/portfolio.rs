use std::collections::HashMap;

use crate::{price_client::PriceSource, state_store::Holding};

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    /// Unrealized P&L against the average entry price.
    pub pnl_percent: Option<f64>,
}

impl Position {
    pub fn line(&self) -> String {
        let pnl = self
            .pnl_percent
            .map(|p| format!(" ({p:+.2}%)"))
            .unwrap_or_default();

        format!(
            "{}: {}×{:.2}€ = {:.2}€{pnl}",
            self.symbol, self.quantity, self.price, self.value
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub positions: Vec<Position>,
    pub total: f64,
}

impl Valuation {
    /// Holdings without a price are left out of both positions and total.
    pub fn from_prices(holdings: &[Holding], prices: &HashMap<String, f64>) -> Self {
        let positions: Vec<Position> = holdings
            .iter()
            .filter_map(|h| {
                let price = *prices.get(&h.symbol.trim().to_uppercase())?;
                let pnl_percent =
                    (h.avg_price != 0.0).then(|| (price - h.avg_price) / h.avg_price * 100.0);

                Some(Position {
                    symbol: h.symbol.clone(),
                    quantity: h.quantity,
                    price,
                    value: price * h.quantity,
                    pnl_percent,
                })
            })
            .collect();

        let total = positions.iter().map(|p| p.value).sum();
        Self { positions, total }
    }
}

/// Prices each distinct holding symbol once and values the portfolio.
pub async fn value_holdings(holdings: &[Holding], source: &dyn PriceSource) -> Valuation {
    let mut prices = HashMap::new();

    for h in holdings {
        let symbol = h.symbol.trim().to_uppercase();
        if prices.contains_key(&symbol) {
            continue;
        }
        if let Some(price) = source.get_price(&symbol).await {
            prices.insert(symbol, price);
        }
    }

    Valuation::from_prices(holdings, &prices)
}
