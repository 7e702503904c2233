use market::Alert;
use tracing::info;

use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn alerts(ctx: Context<'_>) -> Result<(), Error> {
    let alerts = ctx.data().state.alerts().await;
    info!(
        user_id = ctx.author().id.get(),
        count = alerts.len(),
        "alerts: invoked"
    );

    ctx.say(render(&alerts)).await?;
    Ok(())
}

fn render(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "No alerts defined.".to_string();
    }

    alerts
        .iter()
        .map(|a| format!("ID {}: {} {} {}€", a.id, a.symbol, a.operator, a.price))
        .collect::<Vec<_>>()
        .join("\n")
}
