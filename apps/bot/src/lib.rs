use std::sync::Arc;

use market::{NewsClient, PriceClient, SharedState};

pub mod command;
pub mod config;
pub mod scheduler;
pub mod sink;

pub struct Data {
    pub price_client: Arc<PriceClient>,
    pub news_client: Arc<NewsClient>,
    pub state: Arc<SharedState>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
