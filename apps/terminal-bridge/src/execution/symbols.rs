//! Symbol resolution against the broker's tradable instrument list.
//!
//! Venues append venue-specific suffixes (a micro-account marker, for one)
//! inconsistently, so a caller-supplied name like `EUR/USD` may trade as
//! `EURUSDm`. Resolution probes a fixed ladder of case/suffix variants and
//! returns the first one the terminal activates; everything downstream can
//! then assume a canonical tradable symbol.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::broker::gateway::BrokerGateway;
use crate::config::SymbolConfig;
use crate::error::BridgeError;

/// Maps caller-supplied instrument names to canonical tradable symbols.
#[derive(Debug, Default)]
pub struct SymbolResolver {
    suffix: String,
    cache_enabled: bool,
    /// Successful resolutions, keyed by the raw caller symbol.
    cache: RwLock<HashMap<String, String>>,
}

impl SymbolResolver {
    /// Create a resolver from configuration.
    #[must_use]
    pub fn new(config: &SymbolConfig) -> Self {
        Self {
            suffix: config.venue_suffix.clone(),
            cache_enabled: config.cache_resolutions,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a raw symbol to the broker's canonical tradable name.
    ///
    /// Probes each ladder variant with one `select_symbol` call, in order,
    /// short-circuiting on the first success. A cache hit skips the gateway
    /// entirely.
    pub async fn resolve<G: BrokerGateway + ?Sized>(
        &self,
        gateway: &G,
        raw: &str,
    ) -> Result<String, BridgeError> {
        if self.cache_enabled {
            if let Some(resolved) = self.cached(raw) {
                debug!(raw = %raw, resolved = %resolved, "symbol resolved from cache");
                return Ok(resolved);
            }
        }

        let ladder = variant_ladder(&raw.replace('/', ""), &self.suffix);

        for variant in &ladder {
            if gateway.select_symbol(variant).await.map_err(BridgeError::from)? {
                info!(raw = %raw, resolved = %variant, "resolved symbol variant");
                if self.cache_enabled {
                    if let Ok(mut cache) = self.cache.write() {
                        cache.insert(raw.to_string(), variant.clone());
                    }
                }
                return Ok(variant.clone());
            }
        }

        Err(BridgeError::SymbolNotFound {
            symbol: raw.to_string(),
            attempted: ladder,
        })
    }

    fn cached(&self, raw: &str) -> Option<String> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(raw).cloned())
    }
}

/// Case/suffix variants to probe, in priority order, duplicates removed.
fn variant_ladder(base: &str, suffix: &str) -> Vec<String> {
    let candidates = [
        base.to_string(),
        format!("{base}{suffix}"),
        base.to_uppercase(),
        format!("{}{suffix}", base.to_uppercase()),
        base.to_lowercase(),
        format!("{}{suffix}", base.to_lowercase()),
    ];

    let mut ladder: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !ladder.contains(&candidate) {
            ladder.push(candidate);
        }
    }
    ladder
}
