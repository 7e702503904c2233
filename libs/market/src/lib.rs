mod news_client;
mod notify;
mod price_client;
mod state;
mod state_store;

pub mod alerts;
pub mod portfolio;
pub mod report;

#[cfg(test)]
mod testing;

pub use alerts::{AlertEvaluator, AlertHit};
pub use news_client::{DEFAULT_FEEDS, Headline, NewsClient, NewsSource};
pub use notify::{MessageHandle, NotificationSink, SEND_TIMEOUT, send_within};
pub use price_client::{
    DEFAULT_BASE_API, PriceClient, PriceSource, SUPPORTED_SYMBOLS, current_prices, provider_id,
};
pub use report::{ReportBuilder, ReportError};
pub use state::SharedState;
pub use state_store::{Alert, Holding, JsonStateStore, Operator, StateDocument, StoreError};
