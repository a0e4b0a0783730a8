use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use premia_data::{
    error::SocketError,
    exchange::MarketClient,
    shared::{
        subscription_models::{ExchangeId, MarketListing},
        utils::Clock,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const UNIVERSE_SCHEMA_VERSION: u32 = 3;
pub const DEFAULT_UNIVERSE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("universe cache is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("universe cache schema {found} does not match {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("universe cache is {age_secs}s old")]
    Expired { age_secs: u64 },

    #[error("universe cache has no domestic or perp markets")]
    Empty,
}

/*----- */
// Symbol universe
/*----- */
// Canonical coin -> venue market id, one map per market the pair trades on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolUniverse {
    pub domestic: BTreeMap<String, String>,
    pub overseas_spot: BTreeMap<String, String>,
    pub overseas_perp: BTreeMap<String, String>,
}

fn listing_map(listings: &[MarketListing]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for listing in listings {
        if listing.coin.is_empty() || listing.id.is_empty() {
            continue;
        }
        map.entry(listing.coin.clone())
            .or_insert_with(|| listing.id.clone());
    }
    map
}

impl SymbolUniverse {
    /// First listing per coin wins.
    pub fn from_listings(
        domestic: &[MarketListing],
        overseas_spot: &[MarketListing],
        overseas_perp: &[MarketListing],
    ) -> Self {
        Self {
            domestic: listing_map(domestic),
            overseas_spot: listing_map(overseas_spot),
            overseas_perp: listing_map(overseas_perp),
        }
    }

    /// Coins tradable on the domestic market and the overseas perp, sorted.
    pub fn candidates(&self) -> Vec<String> {
        self.domestic
            .keys()
            .filter(|coin| self.overseas_perp.contains_key(*coin))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.domestic.is_empty() || self.overseas_perp.is_empty()
    }
}

/// Pull live listings. A failing spot listing only drops the spot leg.
pub async fn fetch_universe(
    domestic: &dyn MarketClient,
    overseas_spot: Option<&dyn MarketClient>,
    overseas_perp: &dyn MarketClient,
) -> Result<SymbolUniverse, SocketError> {
    let spot = async {
        match overseas_spot {
            Some(client) => match client.markets().await {
                Ok(listings) => listings,
                Err(error) => {
                    warn!(venue = %client.venue(), error = %error, "spot listings unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    };
    let (domestic, spot, perp) = tokio::join!(domestic.markets(), spot, overseas_perp.markets());
    Ok(SymbolUniverse::from_listings(&domestic?, &spot, &perp?))
}

/*----- */
// Disk cache
/*----- */
#[derive(Debug, Serialize, Deserialize)]
struct UniverseFile {
    schema_version: u32,
    updated_at_ts: u64,
    #[serde(default)]
    domestic_exchange: Option<ExchangeId>,
    #[serde(default)]
    overseas_exchange: Option<ExchangeId>,
    domestic_symbols: BTreeMap<String, String>,
    overseas_spot_symbols: BTreeMap<String, String>,
    overseas_perp_symbols: BTreeMap<String, String>,
}

// One json file per pair under `<runtime>/cache/`, fronted by an in-memory copy.
#[derive(Debug)]
pub struct UniverseStore {
    dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    memory: Mutex<HashMap<(ExchangeId, ExchangeId), (u64, SymbolUniverse)>>,
}

impl UniverseStore {
    pub fn new(runtime_dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: runtime_dir.into().join("cache"),
            ttl,
            clock,
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self, domestic: ExchangeId, overseas: ExchangeId) -> PathBuf {
        self.dir.join(format!("universe_{domestic}_{overseas}.json"))
    }

    fn now_secs(&self) -> u64 {
        self.clock.now_ms() / 1_000
    }

    fn check_age(&self, updated_at_ts: u64) -> Result<(), UniverseError> {
        let age_secs = self.now_secs().saturating_sub(updated_at_ts);
        if updated_at_ts == 0 || age_secs > self.ttl.as_secs() {
            return Err(UniverseError::Expired { age_secs });
        }
        Ok(())
    }

    pub async fn read(
        &self,
        domestic: ExchangeId,
        overseas: ExchangeId,
    ) -> Result<SymbolUniverse, UniverseError> {
        let raw = tokio::fs::read(self.path(domestic, overseas)).await?;
        let file = serde_json::from_slice::<UniverseFile>(&raw)?;

        if file.schema_version != UNIVERSE_SCHEMA_VERSION {
            return Err(UniverseError::SchemaMismatch {
                found: file.schema_version,
                expected: UNIVERSE_SCHEMA_VERSION,
            });
        }
        self.check_age(file.updated_at_ts)?;

        let universe = SymbolUniverse {
            domestic: file.domestic_symbols,
            overseas_spot: file.overseas_spot_symbols,
            overseas_perp: file.overseas_perp_symbols,
        };
        if universe.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(universe)
    }

    /// Write to a `.tmp` sibling then rename over the real file.
    pub async fn write(
        &self,
        domestic: ExchangeId,
        overseas: ExchangeId,
        universe: &SymbolUniverse,
    ) -> Result<PathBuf, UniverseError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(domestic, overseas);
        let tmp = path.with_extension("json.tmp");

        let file = UniverseFile {
            schema_version: UNIVERSE_SCHEMA_VERSION,
            updated_at_ts: self.now_secs(),
            domestic_exchange: Some(domestic),
            overseas_exchange: Some(overseas),
            domestic_symbols: universe.domestic.clone(),
            overseas_spot_symbols: universe.overseas_spot.clone(),
            overseas_perp_symbols: universe.overseas_perp.clone(),
        };
        let mut body = serde_json::to_vec_pretty(&file)?;
        body.push(b'\n');

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Memory, then disk, then live listings. A fresh build is written back.
    pub async fn resolve(
        &self,
        domestic: ExchangeId,
        overseas: ExchangeId,
        domestic_client: &dyn MarketClient,
        spot_client: Option<&dyn MarketClient>,
        perp_client: &dyn MarketClient,
    ) -> Result<SymbolUniverse, SocketError> {
        let key = (domestic, overseas);
        if let Some((stored_at, universe)) = self.memory.lock().get(&key).cloned() {
            if self.check_age(stored_at).is_ok() {
                return Ok(universe);
            }
        }

        match self.read(domestic, overseas).await {
            Ok(universe) => {
                debug!(domestic = %domestic, overseas = %overseas, "universe loaded from disk cache");
                self.memory.lock().insert(key, (self.now_secs(), universe.clone()));
                return Ok(universe);
            }
            Err(error) => {
                debug!(domestic = %domestic, overseas = %overseas, error = %error, "universe cache miss");
            }
        }

        let universe = fetch_universe(domestic_client, spot_client, perp_client).await?;
        info!(
            domestic = %domestic,
            overseas = %overseas,
            candidates = universe.candidates().len(),
            "universe rebuilt from live listings"
        );

        if !universe.is_empty() {
            if let Err(error) = self.write(domestic, overseas, &universe).await {
                warn!(error = %error, action = "continuing without disk cache", "failed to persist universe");
            }
            self.memory.lock().insert(key, (self.now_secs(), universe.clone()));
        }
        Ok(universe)
    }
}
