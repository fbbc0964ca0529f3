//! Token bucket with lazy refill.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Longest single sleep while waiting for tokens.
const MAX_WAIT_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

/// A token bucket.
///
/// Tokens are recomputed on every access as
/// `min(capacity, tokens + elapsed * rate)`; there is no background refill.
/// The level is never negative and never above capacity.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket refilling at `rate` tokens per second.
    ///
    /// Negative or non-finite arguments are treated as zero.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = sanitize(rate);
        let capacity = sanitize(capacity);
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket admitting `quota` units per `window`, with room for
    /// `quota * burst_multiplier` units at once.
    pub fn per_window(quota: u32, window: Duration, burst_multiplier: f64) -> Self {
        let quota = f64::from(quota);
        let window = window.as_secs_f64();
        let rate = if window > 0.0 { quota / window } else { 0.0 };
        Self::new(rate, quota * burst_multiplier)
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens available right now.
    pub fn available(&self) -> f64 {
        self.available_at(Instant::now())
    }

    pub(crate) fn available_at(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        state.refill(now, self.rate, self.capacity);
        state.tokens
    }

    /// Take `tokens` if available right now.
    pub fn try_acquire(&self, tokens: f64) -> bool {
        self.try_take(tokens, Instant::now()).is_ok()
    }

    pub(crate) fn try_acquire_at(&self, tokens: f64, now: Instant) -> bool {
        self.try_take(tokens, now).is_ok()
    }

    /// Take tokens or report how long until enough have accumulated.
    fn try_take(&self, tokens: f64, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();
        state.refill(now, self.rate, self.capacity);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            return Ok(());
        }

        if self.rate <= 0.0 {
            return Err(Duration::MAX);
        }
        let deficit = tokens - state.tokens;
        Err(Duration::try_from_secs_f64(deficit / self.rate).unwrap_or(Duration::MAX))
    }

    /// Take `tokens`, optionally waiting for them.
    ///
    /// Non-blocking calls return `false` at once when the bucket is short.
    /// Blocking calls sleep in steps of at most 100 ms, re-checking after each,
    /// until the tokens are taken or `timeout` elapses. `None` waits as long
    /// as refill needs. A request larger than the capacity can never be met
    /// and is refused immediately.
    pub async fn acquire(&self, tokens: f64, blocking: bool, timeout: Option<Duration>) -> bool {
        if tokens > self.capacity {
            tracing::warn!(
                requested = tokens,
                capacity = self.capacity,
                "Token request exceeds bucket capacity"
            );
            return false;
        }

        // A timeout too large to represent waits without a deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let wait = match self.try_take(tokens, Instant::now()) {
                Ok(()) => return true,
                Err(wait) => wait,
            };

            if !blocking || wait == Duration::MAX {
                return false;
            }

            let mut step = wait.min(MAX_WAIT_STEP);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                step = step.min(deadline - now);
            }

            tokio::time::sleep(step).await;
        }
    }

    /// Remove up to `tokens` without waiting. Returns the amount removed.
    pub fn drain(&self, tokens: f64) -> f64 {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.rate, self.capacity);
        let taken = sanitize(tokens).min(state.tokens);
        state.tokens -= taken;
        taken
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
