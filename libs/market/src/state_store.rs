use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {} could not be accessed: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<")]
    Below,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Above => ">",
            Operator::Below => "<",
        }
    }

    /// Strict comparison; equality never holds.
    pub fn holds(&self, price: f64, threshold: f64) -> bool {
        match self {
            Operator::Above => price > threshold,
            Operator::Below => price < threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Zero means unassigned; [`JsonStateStore::load`] numbers those.
    #[serde(default)]
    pub id: u64,
    pub symbol: String,
    pub operator: Operator,
    pub price: f64,
}

impl Alert {
    pub fn is_triggered(&self, current: f64) -> bool {
        self.operator.holds(current, self.price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
}

/// Everything the bot persists. Missing keys default to empty, unknown keys
/// are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub portfolio: Vec<Holding>,

    #[serde(default)]
    pub watchlist: Vec<String>,

    #[serde(default)]
    pub last_prices: BTreeMap<String, f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StateDocument {
    /// Gives every alert without an id its 1-based position, or the next free
    /// id when that position is already taken.
    pub fn number_alerts(&mut self) {
        let mut used: HashSet<u64> = self
            .alerts
            .iter()
            .map(|a| a.id)
            .filter(|id| *id != 0)
            .collect();

        for (i, alert) in self.alerts.iter_mut().enumerate() {
            if alert.id != 0 {
                continue;
            }
            let mut id = i as u64 + 1;
            while used.contains(&id) {
                id += 1;
            }
            used.insert(id);
            alert.id = id;
        }
    }
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is a first run and yields the empty document.
    pub fn load(&self) -> Result<StateDocument, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateDocument::default()),
            Err(e) => return Err(self.persistence(e)),
        };

        let mut doc: StateDocument =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        doc.number_alerts();
        Ok(doc)
    }

    pub fn save(&self, doc: &StateDocument) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(doc).map_err(|e| self.persistence(io::Error::other(e)))?;
        let tmp = self.temp_path();

        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)?;
            sync_parent(&self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.persistence(e)
        })
    }

    // Same directory as the target so the rename never crosses filesystems.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub(crate) fn persistence(&self, source: io::Error) -> StoreError {
        StoreError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

// Makes the rename itself durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> StateDocument {
        StateDocument {
            alerts: vec![
                Alert {
                    id: 1,
                    symbol: "BTC".into(),
                    operator: Operator::Above,
                    price: 50000.0,
                },
                Alert {
                    id: 2,
                    symbol: "ETH".into(),
                    operator: Operator::Below,
                    price: 1999.99,
                },
            ],
            portfolio: vec![Holding {
                symbol: "SOL".into(),
                quantity: 12.5,
                avg_price: 87.3,
            }],
            watchlist: vec!["BTC".into(), "SOL".into()],
            last_prices: BTreeMap::from([("BTC".into(), 100.0), ("ETH".into(), 0.1)]),
            extra: Map::new(),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> JsonStateStore {
        JsonStateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn missing_file_loads_empty_document() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(store_in(&dir).load().unwrap(), StateDocument::default());
    }

    #[test]
    fn round_trips_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for doc in [StateDocument::default(), sample()] {
            store.save(&doc).unwrap();
            assert_eq!(store.load().unwrap(), doc);
        }
    }

    #[test]
    fn saving_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let doc = sample();

        store.save(&doc).unwrap();
        let first = fs::read(store.path()).unwrap();
        store.save(&doc).unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), first);
        assert_eq!(store.load().unwrap(), doc);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn defaults_missing_keys_and_keeps_unknown_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            json!({ "alerts": [{"id": 7, "symbol": "SOL", "operator": "<", "price": 20}], "theme": "dark" })
                .to_string(),
        )
        .unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.alerts[0].operator, Operator::Below);
        assert!(doc.portfolio.is_empty());
        assert!(doc.watchlist.is_empty());
        assert!(doc.last_prices.is_empty());

        store.save(&doc).unwrap();
        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["theme"], json!("dark"));
        assert_eq!(raw["last_prices"], json!({}));
        assert_eq!(raw["watchlist"], json!([]));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for body in ["{ not json", "", r#"{"alerts":[{"id":1,"symbol":"BTC","operator":">=","price":1}]}"#] {
            fs::write(store.path(), body).unwrap();
            assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })), "{body:?}");
        }
    }

    #[test]
    fn unwritable_location_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("missing").join("state.json"));

        assert!(matches!(
            store.save(&sample()),
            Err(StoreError::Persistence { .. })
        ));
    }

    #[test]
    fn operator_comparison_is_strict() {
        assert!(Operator::Above.holds(50001.0, 50000.0));
        assert!(!Operator::Above.holds(50000.0, 50000.0));
        assert!(!Operator::Above.holds(49999.0, 50000.0));
        assert!(Operator::Below.holds(49999.0, 50000.0));
        assert!(!Operator::Below.holds(50000.0, 50000.0));
        assert!(!Operator::Below.holds(50001.0, 50000.0));
    }

    #[test]
    fn alerts_without_ids_are_numbered_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            json!({ "alerts": [
                {"symbol": "BTC", "operator": ">", "price": 50000},
                {"id": 1, "symbol": "ETH", "operator": "<", "price": 2000},
                {"symbol": "SOL", "operator": "<", "price": 20},
            ] })
            .to_string(),
        )
        .unwrap();

        let doc = store.load().unwrap();

        let ids: Vec<u64> = doc.alerts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(doc.alerts[0].symbol, "BTC");

        store.save(&doc).unwrap();
        assert_eq!(store.load().unwrap(), doc);
    }
}
