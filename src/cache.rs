//! Request-deduplicating quote cache.
//!
//! Quotes are cached for a short TTL under a canonical hash of the request
//! parameters. Concurrent identical requests coalesce: the first caller
//! (leader) computes while the rest wait on a notification, bounded by a
//! wait budget after which they compute independently rather than blocking
//! forever. The cache map and the in-flight marker set are the only shared
//! mutable state in the service.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use moka::future::Cache;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::pricing::requests::PriceRequest;
use crate::pricing::responses::PriceResponse;

/// How long a computed quote stays reusable.
const QUOTE_TTL: Duration = Duration::from_secs(60);

/// Maximum quotes held at once.
const QUOTE_CAPACITY: u64 = 1000;

/// How long a duplicate request waits for the in-flight computation before
/// computing independently.
const WAIT_BUDGET: Duration = Duration::from_secs(5);

/// In-flight markers older than this are considered abandoned.
const INFLIGHT_ABANDON: Duration = Duration::from_secs(30);

/// Sweep cadence for abandoned markers.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct InFlightMarker {
    started: Instant,
    notify: Arc<Notify>,
}

impl InFlightMarker {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            notify: Arc::new(Notify::new()),
        }
    }
}

/// Quote cache with at-most-one-in-flight deduplication.
pub struct QuoteCache {
    quotes: Cache<String, Arc<PriceResponse>>,
    in_flight: Mutex<HashMap<String, InFlightMarker>>,
    wait_budget: Duration,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::with_ttl(QUOTE_TTL)
    }

    /// TTL-injectable constructor, used by expiry tests.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            quotes: Cache::builder()
                .max_capacity(QUOTE_CAPACITY)
                .time_to_live(ttl)
                .build(),
            in_flight: Mutex::new(HashMap::new()),
            wait_budget: WAIT_BUDGET,
        }
    }

    /// Canonical hash of the request parameters.
    ///
    /// Coordinates round to 6 decimal places (~11 cm), the pickup timestamp
    /// truncates to the minute, and the category is case-folded, so
    /// near-identical requests share an entry while requests that could
    /// price differently never collide.
    pub fn request_hash(request: &PriceRequest) -> String {
        format!(
            "{:.6}|{:.6}|{:.6}|{:.6}|{}|{}|{}",
            request.pickup_lat,
            request.pickup_lng,
            request.dropoff_lat,
            request.dropoff_lng,
            request.trip_type.as_str(),
            request.pickup_time.format("%Y-%m-%dT%H:%M"),
            request.normalized_category().unwrap_or_default(),
        )
    }

    /// Return the cached response for `hash`, or compute it with
    /// single-flight semantics.
    pub async fn get_or_compute<F, Fut>(&self, hash: &str, compute: F) -> Arc<PriceResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PriceResponse>,
    {
        if let Some(cached) = self.quotes.get(hash).await {
            debug!("cache hit for {hash}");
            return cached;
        }

        let existing = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get(hash) {
                Some(marker) => Some(marker.notify.clone()),
                None => {
                    in_flight.insert(hash.to_string(), InFlightMarker::new());
                    None
                }
            }
        };

        if let Some(notify) = existing {
            debug!("identical request in flight for {hash}, waiting");
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // The leader may have finished between our cache miss and the
            // marker lookup; re-check before sleeping.
            if let Some(cached) = self.quotes.get(hash).await {
                return cached;
            }
            if timeout(self.wait_budget, notified).await.is_err() {
                warn!("in-flight wait budget expired for {hash}, computing independently");
            }
            if let Some(cached) = self.quotes.get(hash).await {
                return cached;
            }
            // The leader vanished without populating the cache; compute
            // without touching its marker.
            return Arc::new(compute().await);
        }

        let response = Arc::new(compute().await);
        // Populate the cache before waking waiters so they never observe
        // the notification without the entry.
        self.quotes.insert(hash.to_string(), response.clone()).await;
        let notify = self.lock_in_flight().remove(hash).map(|m| m.notify);
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
        response
    }

    /// Drop in-flight markers whose computation appears abandoned. Entry
    /// expiry itself is handled by the TTL.
    pub fn sweep_in_flight(&self) {
        let mut in_flight = self.lock_in_flight();
        let before = in_flight.len();
        in_flight.retain(|_, marker| marker.started.elapsed() < INFLIGHT_ABANDON);
        let swept = before - in_flight.len();
        if swept > 0 {
            info!("swept {swept} abandoned in-flight marker(s)");
        }
    }

    /// Cache statistics for the monitoring endpoint.
    pub async fn stats(&self) -> CacheStats {
        self.quotes.run_pending_tasks().await;
        CacheStats {
            quote_entries: self.quotes.entry_count(),
            in_flight: self.lock_in_flight().len(),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlightMarker>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn insert_stale_marker(&self, hash: &str, age: Duration) {
        let marker = InFlightMarker {
            started: Instant::now()
                .checked_sub(age)
                .expect("monotonic clock supports backdating in tests"),
            notify: Arc::new(Notify::new()),
        };
        self.lock_in_flight().insert(hash.to_string(), marker);
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for the monitoring endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub quote_entries: u64,
    pub in_flight: usize,
}

/// Background task: periodically sweep abandoned in-flight markers.
pub async fn start_cache_sweeper(cache: Arc<QuoteCache>) {
    let mut ticker = interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        cache.quotes.run_pending_tasks().await;
        cache.sweep_in_flight();
    }
}
