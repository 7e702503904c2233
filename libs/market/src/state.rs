use std::{collections::BTreeMap, io};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::state_store::{Alert, JsonStateStore, StateDocument, StoreError};

/// In-memory copy of the state document, owned by the process and handed to
/// every task that needs it. The report cycle is the only writer.
pub struct SharedState {
    store: JsonStateStore,
    doc: RwLock<StateDocument>,
}

impl SharedState {
    pub fn new(store: JsonStateStore, doc: StateDocument) -> Self {
        Self {
            store,
            doc: RwLock::new(doc),
        }
    }

    /// Loads the document and writes it straight back so the file exists with
    /// every key filled in. A corrupt file is returned as an error; a failed
    /// write-back is only logged.
    pub fn open(store: JsonStateStore) -> Result<Self, StoreError> {
        let doc = store.load()?;

        if let Err(e) = store.save(&doc) {
            warn!(error = %e, "could not write initial state");
        }

        debug!(
            path = %store.path().display(),
            alerts = doc.alerts.len(),
            holdings = doc.portfolio.len(),
            watchlist = doc.watchlist.len(),
            "state loaded"
        );

        Ok(Self::new(store, doc))
    }

    pub async fn snapshot(&self) -> StateDocument {
        self.doc.read().await.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.doc.read().await.alerts.clone()
    }

    pub async fn last_prices(&self) -> BTreeMap<String, f64> {
        self.doc.read().await.last_prices.clone()
    }

    /// Merges observed prices into `last_prices` and persists. The in-memory
    /// document only changes once the write has succeeded, so memory never
    /// runs ahead of disk. The file write runs on the blocking pool.
    pub async fn record_prices(&self, observed: &BTreeMap<String, f64>) -> Result<(), StoreError> {
        let mut doc = self.doc.write().await;

        let mut next = doc.clone();
        next.last_prices.extend(
            observed
                .iter()
                .filter(|(_, price)| price.is_finite())
                .map(|(symbol, price)| (symbol.clone(), *price)),
        );

        let store = self.store.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&next).map(|()| next))
            .await
            .map_err(|e| self.store.persistence(io::Error::other(e)))??;

        *doc = saved;
        Ok(())
    }
}
