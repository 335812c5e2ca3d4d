use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

pub const DEFAULT_MAX_CONNECTION_PER_IP: usize = 1;
pub const DEFAULT_MAX_REQUEST_PER_SECOND: u64 = 1;
pub const DEFAULT_MAX_BYTES_PER_IP: u64 = 10 * 1024 * 1024;

/// Per-address admission limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterOptions {
    /// Concurrent admitted requests per address
    pub max_connection_per_ip: usize,
    /// Admissions per window per address
    pub max_request_per_second: u64,
    /// Cumulative byte cap per address, never reset
    pub max_bytes_per_ip: u64,
    /// Length of the request-rate window
    pub window: Duration,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            max_connection_per_ip: DEFAULT_MAX_CONNECTION_PER_IP,
            max_request_per_second: DEFAULT_MAX_REQUEST_PER_SECOND,
            max_bytes_per_ip: DEFAULT_MAX_BYTES_PER_IP,
            window: Duration::from_secs(1),
        }
    }
}

impl LimiterOptions {
    /// Replace every zero tunable with its default
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            max_connection_per_ip: nonzero_or(self.max_connection_per_ip, defaults.max_connection_per_ip),
            max_request_per_second: nonzero_or(self.max_request_per_second, defaults.max_request_per_second),
            max_bytes_per_ip: nonzero_or(self.max_bytes_per_ip, defaults.max_bytes_per_ip),
            window: if self.window.is_zero() {
                defaults.window
            } else {
                self.window
            },
        }
    }
}

fn nonzero_or<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Reasons an address is refused admission
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("request rate exceeded for {remote}")]
    TooManyRequests { remote: String, retry_after: Duration },

    #[error("byte quota exhausted for {remote}")]
    ByteQuotaExhausted { remote: String },

    #[error("too many concurrent requests from {remote}")]
    ConcurrencyExhausted { remote: String },
}

impl RateLimitError {
    /// Whole seconds a client should wait before retrying, if waiting helps
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitError::TooManyRequests { retry_after, .. } => {
                Some(retry_after.as_secs_f64().ceil().max(1.0) as u64)
            }
            RateLimitError::ConcurrencyExhausted { .. } => Some(1),
            RateLimitError::ByteQuotaExhausted { .. } => None,
        }
    }
}

#[derive(Debug)]
struct Window {
    start: Instant,
    requests: u64,
    last_seen: Instant,
}

/// Counters for one remote address
#[derive(Debug)]
pub struct RemoteLimitState {
    window: Mutex<Window>,
    slots: Arc<Semaphore>,
    bytes: AtomicU64,
}

impl RemoteLimitState {
    fn new(max_connections: usize) -> Self {
        let now = Instant::now();
        Self {
            window: Mutex::new(Window {
                start: now,
                requests: 0,
                last_seen: now,
            }),
            slots: Arc::new(Semaphore::new(max_connections)),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }

    fn record(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::AcqRel);
    }
}

/// Concurrency slot held by an admitted request.
///
/// The slot returns to the address when the guard is released or dropped,
/// so every successful `acquire` is paired with exactly one release.
#[derive(Debug)]
pub struct Admission {
    state: Arc<RemoteLimitState>,
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    /// Add to the address's cumulative byte counter
    pub fn record_transferred(&self, bytes: u64) {
        self.state.record(bytes);
    }

    pub fn release(self) {}
}

/// Per-remote-address admission gate.
///
/// The map is only write-locked when an address is seen for the first time;
/// afterwards each address's counters are synchronised on their own.
#[derive(Debug)]
pub struct RateLimiter {
    options: LimiterOptions,
    states: DashMap<String, Arc<RemoteLimitState>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(LimiterOptions::default())
    }
}

impl RateLimiter {
    pub fn new(options: LimiterOptions) -> Self {
        Self {
            options: options.normalized(),
            states: DashMap::new(),
        }
    }

    pub fn options(&self) -> &LimiterOptions {
        &self.options
    }

    /// Number of addresses currently tracked
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn state_for(&self, remote: &str) -> Arc<RemoteLimitState> {
        if let Some(state) = self.states.get(remote) {
            return Arc::clone(state.value());
        }

        // Racing first-seen callers all end up with the entry that won
        let state = self
            .states
            .entry(remote.to_string())
            .or_insert_with(|| Arc::new(RemoteLimitState::new(self.options.max_connection_per_ip)));
        Arc::clone(state.value())
    }

    /// Try to admit one request from `remote`. Never blocks.
    ///
    /// Checks run in order (request rate, byte quota, concurrency) and stop
    /// at the first failure.
    pub fn acquire(&self, remote: &str) -> Result<Admission, RateLimitError> {
        let state = self.state_for(remote);
        let now = Instant::now();

        {
            let mut window = state.window.lock();
            window.last_seen = now;

            let elapsed = now.duration_since(window.start);
            if elapsed >= self.options.window {
                window.start = now;
                window.requests = 0;
            }

            window.requests += 1;
            if window.requests > self.options.max_request_per_second {
                let retry_after = self
                    .options
                    .window
                    .saturating_sub(now.duration_since(window.start));
                return Err(RateLimitError::TooManyRequests {
                    remote: remote.to_string(),
                    retry_after,
                });
            }
        }

        if state.bytes_transferred() > self.options.max_bytes_per_ip {
            return Err(RateLimitError::ByteQuotaExhausted {
                remote: remote.to_string(),
            });
        }

        let permit = Arc::clone(&state.slots)
            .try_acquire_owned()
            .map_err(|_| RateLimitError::ConcurrencyExhausted {
                remote: remote.to_string(),
            })?;

        Ok(Admission {
            state,
            _permit: permit,
        })
    }

    /// Add to the byte counter of an address; never denies by itself
    pub fn record_transferred(&self, remote: &str, bytes: u64) {
        self.state_for(remote).record(bytes);
    }

    /// Cumulative bytes recorded for `remote`
    pub fn bytes_transferred(&self, remote: &str) -> u64 {
        self.states
            .get(remote)
            .map(|state| state.bytes_transferred())
            .unwrap_or_default()
    }

    /// Forget addresses idle for at least `max_idle` with no request in
    /// flight. Addresses over their byte cap are kept so the cap holds.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.states.len();
        let max_connections = self.options.max_connection_per_ip;
        let max_bytes = self.options.max_bytes_per_ip;

        self.states.retain(|_, state| {
            let idle = state.window.lock().last_seen.elapsed() >= max_idle;
            let in_flight = state.slots.available_permits() < max_connections;
            let banned = state.bytes_transferred() > max_bytes;
            !idle || in_flight || banned
        });

        let pruned = before.saturating_sub(self.states.len());
        if pruned > 0 {
            debug!(pruned, remaining = self.states.len(), "pruned idle rate limiter entries");
        }
        pruned
    }
}
