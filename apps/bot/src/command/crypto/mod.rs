mod alerts;
mod news;
mod portfolio;
mod price;
mod watchlist;

use crate::{Context, Error};
use alerts::alerts;
use news::news;
use portfolio::portfolio;
use price::price;
use watchlist::watchlist;

#[poise::command(
    slash_command,
    rename = "crypto",
    subcommands("price", "news", "alerts", "portfolio", "watchlist")
)]
pub async fn crypto_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}
