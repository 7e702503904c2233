use market::{Headline, NewsSource};
use tracing::info;

use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn news(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let headlines = ctx.data().news_client.get_headlines().await;
    info!(
        user_id = ctx.author().id.get(),
        headlines = headlines.len(),
        "news: invoked"
    );

    ctx.say(render(&headlines)).await?;
    Ok(())
}

fn render(headlines: &[Headline]) -> String {
    if headlines.is_empty() {
        return "No news available right now.".to_string();
    }

    let lines: Vec<String> = headlines.iter().map(|h| format!("• {}", h.title)).collect();
    format!("📰 **Crypto news**:\n{}", lines.join("\n"))
}
