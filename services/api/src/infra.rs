use insurance_exchange::config::CacheConfig;
use insurance_exchange::error::AppError;
use insurance_exchange::marketplace::{MarketplaceError, MarketplaceService};
use insurance_exchange::views::{InMemoryViewCounter, RedisViewCounter, ViewCounter};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Insurance types offered on a fresh installation, with their covered risks.
pub(crate) const DEFAULT_INSURANCE_TYPES: &[(&str, &[&str])] = &[
    ("Fire", &["fire", "lightning", "explosion"]),
    ("Flood", &["flood", "storm surge", "burst pipes"]),
    ("Auto", &["collision", "theft", "vandalism"]),
    ("Life", &["death", "critical illness", "disability"]),
];

/// Policy durations offered on a fresh installation, in months.
pub(crate) const DEFAULT_VALIDITY_TYPES: &[(&str, f64)] =
    &[("6 months", 6.0), ("1 year", 12.0), ("3 years", 36.0)];

/// Catalog entries inserted by one seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SeededCatalog {
    pub(crate) insurance_types: usize,
    pub(crate) validity_types: usize,
}

/// Populate an empty catalog with the default choices. A catalog that
/// already has entries is left untouched.
pub(crate) fn seed_catalog(
    marketplace: &MarketplaceService,
) -> Result<SeededCatalog, MarketplaceError> {
    let catalog = marketplace.catalog()?;
    let mut seeded = SeededCatalog::default();

    if catalog.insurance_types.is_empty() {
        for (name, risks) in DEFAULT_INSURANCE_TYPES {
            let risks = risks.iter().map(|risk| risk.to_string()).collect();
            marketplace.add_insurance_type(name, risks)?;
            seeded.insurance_types += 1;
        }
    }
    if catalog.validity_types.is_empty() {
        for (name, months) in DEFAULT_VALIDITY_TYPES {
            marketplace.add_validity_type(name, *months)?;
            seeded.validity_types += 1;
        }
    }

    if seeded == SeededCatalog::default() {
        debug!("catalog already populated");
    } else {
        info!(
            insurance_types = seeded.insurance_types,
            validity_types = seeded.validity_types,
            "catalog seeded"
        );
    }
    Ok(seeded)
}

/// Redis-backed counters when a cache host is configured, process memory
/// otherwise.
pub(crate) fn view_counter(cache: &CacheConfig) -> Result<Arc<dyn ViewCounter>, AppError> {
    match cache.redis_url() {
        Some(url) => {
            let counter = RedisViewCounter::connect(&url, cache.timeout())?;
            info!(
                port = cache.port,
                timeout_ms = cache.timeout_ms,
                "view counters backed by redis"
            );
            Ok(Arc::new(counter))
        }
        None => {
            info!("view counters kept in process memory");
            Ok(Arc::new(InMemoryViewCounter::new()))
        }
    }
}
