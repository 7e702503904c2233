use market::PriceSource;
use tracing::{debug, info};

use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn watchlist(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let symbols = ctx.data().state.snapshot().await.watchlist;
    if symbols.is_empty() {
        ctx.say("Watchlist is empty.").await?;
        return Ok(());
    }

    let price_client = &ctx.data().price_client;
    let mut quotes = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let price = price_client.get_price(&symbol).await;
        debug!(symbol = %symbol, ?price, "watchlist: quoted");
        quotes.push((symbol, price));
    }

    info!(
        user_id = ctx.author().id.get(),
        count = quotes.len(),
        "watchlist: invoked"
    );

    ctx.say(render(&quotes)).await?;
    Ok(())
}

fn render(quotes: &[(String, Option<f64>)]) -> String {
    let lines: Vec<String> = quotes
        .iter()
        .map(|(symbol, price)| match price {
            Some(p) => format!("{symbol}: {p:.2}€"),
            None => format!("{symbol}: unavailable"),
        })
        .collect();

    format!("🔍 **Watchlist**:\n{}", lines.join("\n"))
}
