use market::portfolio::{Valuation, value_holdings};
use tracing::info;

use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn portfolio(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let holdings = ctx.data().state.snapshot().await.portfolio;
    if holdings.is_empty() {
        ctx.say("Portfolio is empty.").await?;
        return Ok(());
    }

    let valuation = value_holdings(&holdings, ctx.data().price_client.as_ref()).await;
    info!(
        user_id = ctx.author().id.get(),
        holdings = holdings.len(),
        priced = valuation.positions.len(),
        "portfolio: invoked"
    );

    ctx.say(render(&valuation)).await?;
    Ok(())
}

fn render(valuation: &Valuation) -> String {
    let mut lines: Vec<String> = valuation.positions.iter().map(|p| p.line()).collect();
    lines.push(format!("\nTotal: {:.2}€", valuation.total));
    lines.join("\n")
}
