//! Single-flight position fetching with a freshness cache.
//!
//! Several UI surfaces tend to ask "where are we?" at the same moment (a
//! clock-in button, a status badge, a map pane). Only one hardware request
//! should ever result: concurrent callers coalesce onto the in-flight fetch,
//! and callers arriving shortly after a fix completes are served from a
//! short-lived cache.
//!
//! # Architecture
//!
//! ```text
//! Caller A ─┐
//!           │                            ┌──► freshness cache (TTL)
//! Caller B ─┼──► SingleFlightFetcher ────┤
//!           │            │               └──► PositionSource ──► hardware
//! Caller C ─┘            ▼
//!              [A, B, C all receive
//!               the same fix]
//! ```
//!
//! # Implementation
//!
//! One mutex-guarded slot tracks the cached fix and the in-flight broadcast
//! channel; the lock is never held across an await. Statistics use atomic
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::position::{LocationSample, PositionError, PositionSource};

/// Broadcast capacity for fan-out to coalesced waiters.
///
/// Exactly one result is ever sent per channel, so waiters cannot lag.
const BROADCAST_CAPACITY: usize = 16;

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a completed fix keeps serving subsequent fetches.
    pub cache_ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::mobile()
    }
}

impl FetcherConfig {
    /// Profile for phones and tablets: workers walk, they don't teleport.
    pub fn mobile() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
        }
    }

    /// Profile for kiosk and desktop deployments with network positioning,
    /// where a stale fix is cheaper to replace.
    pub fn desktop() -> Self {
        Self {
            cache_ttl: Duration::from_secs(10),
        }
    }

    /// Set the freshness window.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// Statistics for monitoring fetch deduplication effectiveness.
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    /// Total fetch calls received.
    pub total_requests: u64,
    /// Calls served from the freshness cache.
    pub cache_hits: u64,
    /// Calls that waited on an already-running fetch.
    pub coalesced_requests: u64,
    /// Calls that actually reached the hardware.
    pub hardware_requests: u64,
}

impl FetchStats {
    /// Fraction of calls that piggybacked on in-flight work (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }

    /// Fraction of calls answered from cache (0.0 to 1.0).
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// A completed fix with the moment it finished, for TTL checks.
struct CachedFix {
    sample: LocationSample,
    fetched_at: Instant,
}

/// Cache slot plus the in-flight fan-out channel.
#[derive(Default)]
struct FetchState {
    cached: Option<CachedFix>,
    in_flight: Option<broadcast::Sender<Result<LocationSample, PositionError>>>,
}

/// Deduplicating front door for "where are we right now?".
///
/// See the module docs for the flow. The fetcher owns no task: whichever
/// caller arrives first drives the hardware read, and everyone else either
/// reads the cache or subscribes to that caller's result.
pub struct SingleFlightFetcher {
    source: PositionSource,
    config: FetcherConfig,
    state: Mutex<FetchState>,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    coalesced_requests: AtomicU64,
    hardware_requests: AtomicU64,
}

impl SingleFlightFetcher {
    /// Create a fetcher over the given source.
    pub fn new(source: PositionSource, config: FetcherConfig) -> Self {
        Self {
            source,
            config,
            state: Mutex::new(FetchState::default()),
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            hardware_requests: AtomicU64::new(0),
        }
    }

    /// The current position, deduplicated and freshness-cached.
    ///
    /// Failures are shared exactly like successes: every coalesced caller
    /// of a failing fetch sees the same [`PositionError`]. Failed results
    /// are never cached, so the next call tries the hardware again.
    pub async fn fetch(&self) -> Result<LocationSample, PositionError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let maybe_rx = {
            let mut state = self.state.lock().unwrap();

            if let Some(cached) = &state.cached {
                let age = cached.fetched_at.elapsed();
                if age <= self.config.cache_ttl {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    trace!(age_ms = age.as_millis() as u64, "Serving cached fix");
                    return Ok(cached.sample.clone());
                }
            }

            if let Some(tx) = &state.in_flight {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!("Coalescing onto in-flight position fetch");
                Some(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
                state.in_flight = Some(tx);
                None
            }
        };

        match maybe_rx {
            Some(mut rx) => match rx.recv().await {
                Ok(result) => result,
                // Sender dropped without completing: the driving caller
                // was cancelled mid-fetch
                Err(_) => Err(PositionError::Unavailable(
                    "position fetch interrupted".to_string(),
                )),
            },
            None => self.drive_fetch().await,
        }
    }

    /// Drop any cached fix so the next fetch reads the hardware.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        if state.cached.take().is_some() {
            debug!("Freshness cache invalidated");
        }
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            hardware_requests: self.hardware_requests.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total = stats.total_requests,
            cache_hits = stats.cache_hits,
            coalesced = stats.coalesced_requests,
            hardware = stats.hardware_requests,
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Position fetch statistics"
        );
    }

    /// Perform the hardware read on behalf of every current waiter.
    async fn drive_fetch(&self) -> Result<LocationSample, PositionError> {
        // If this future is dropped mid-read, the guard closes the channel
        // so waiters fail instead of hanging
        let mut guard = InFlightGuard {
            fetcher: self,
            completed: false,
        };

        self.hardware_requests.fetch_add(1, Ordering::Relaxed);
        let result = self.source.get_once().await;

        {
            let mut state = self.state.lock().unwrap();
            if let Ok(sample) = &result {
                state.cached = Some(CachedFix {
                    sample: sample.clone(),
                    fetched_at: Instant::now(),
                });
            }
            if let Some(tx) = state.in_flight.take() {
                let waiters = tx.receiver_count();
                let _ = tx.send(result.clone());
                if waiters > 0 {
                    debug!(waiters, "Broadcast fix to coalesced waiters");
                }
            }
        }

        guard.completed = true;
        result
    }
}

struct InFlightGuard<'a> {
    fetcher: &'a SingleFlightFetcher,
    completed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let mut state = self.fetcher.state.lock().unwrap();
            // Dropping the sender closes the channel, waiters get RecvError
            state.in_flight = None;
        }
    }
}
