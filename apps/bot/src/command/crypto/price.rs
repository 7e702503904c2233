use std::collections::BTreeMap;

use market::{SUPPORTED_SYMBOLS, current_prices};
use tracing::info;

use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn price(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let prices = current_prices(ctx.data().price_client.as_ref()).await;
    info!(
        user_id = ctx.author().id.get(),
        quoted = prices.len(),
        "price: invoked"
    );

    ctx.say(render(&prices)).await?;
    Ok(())
}

fn render(prices: &BTreeMap<String, f64>) -> String {
    let lines: Vec<String> = SUPPORTED_SYMBOLS
        .iter()
        .filter_map(|(symbol, _)| {
            prices
                .get(*symbol)
                .map(|p| format!("• {symbol}: {p:.2}€"))
        })
        .collect();

    if lines.is_empty() {
        return "Price lookup failed.".to_string();
    }
    format!("💰 **Prices**:\n{}", lines.join("\n"))
}
