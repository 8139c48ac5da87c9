// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Snapshot of the lifetime counters of a [`TokenBucket`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateCounts {
    /// Every call to [`TokenBucket::count`]
    pub requested: u64,
    /// Calls where the random draw fell under the sample rate
    pub sampled: u64,
    /// Calls admitted by consuming a token
    pub traced: u64,
    /// Calls refused because the bucket was empty
    pub limited: u64,
    /// Calls admitted without consuming a token
    pub through: u64,
}

/// A token bucket rate limiter with proportional refill.
///
/// Cloning a bucket yields a handle on the same state.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<Mutex<TokenBucketState>>,
}

struct TokenBucketState {
    /// Tokens added per second of elapsed time
    rate_per_sec: f64,

    /// Maximum number of tokens that can be stored
    capacity: f64,

    /// Current number of tokens, always in `0..=capacity`
    available: f64,

    /// Last time tokens were replenished
    last_refill: Instant,

    counts: RateCounts,
}

impl TokenBucketState {
    /// Adds `elapsed * rate` tokens, capped at capacity. Time going backwards adds
    /// nothing.
    fn refill(&mut self, now: Instant) {
        if self.available < self.capacity {
            if let Some(elapsed) = now.checked_duration_since(self.last_refill) {
                self.available = (self.available + elapsed.as_secs_f64() * self.rate_per_sec)
                    .min(self.capacity);
            }
        }
        self.last_refill = now;
    }

    fn consume(&mut self, n: f64, now: Instant) -> bool {
        self.refill(now);
        if self.available >= n {
            self.available -= n;
            true
        } else {
            false
        }
    }
}

/// Negative and NaN rates or capacities behave like zero
fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenBucket")
            .field("rate_per_sec", &state.rate_per_sec)
            .field("capacity", &state.capacity)
            .field("available", &state.available)
            .field("counts", &state.counts)
            .finish()
    }
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(rate_per_sec: f64, capacity: f64) -> Self {
        Self::new_at(rate_per_sec, capacity, Instant::now())
    }

    pub(crate) fn new_at(rate_per_sec: f64, capacity: f64, now: Instant) -> Self {
        let capacity = sanitize(capacity);
        let state = TokenBucketState {
            rate_per_sec: sanitize(rate_per_sec),
            capacity,
            available: capacity,
            last_refill: now,
            counts: RateCounts::default(),
        };
        TokenBucket {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucketState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refills the bucket for the time elapsed since the last refill, then takes `n`
    /// tokens if that many are available.
    ///
    /// # Returns
    /// `true` if the tokens were taken. On `false` the balance is left untouched.
    pub fn consume(&self, n: f64) -> bool {
        self.consume_at(n, Instant::now())
    }

    pub(crate) fn consume_at(&self, n: f64, now: Instant) -> bool {
        self.lock().consume(n, now)
    }

    /// Changes the refill rate and the capacity. The balance is lowered to the new
    /// capacity if needed, never raised.
    pub fn set_rate_cap(&self, rate_per_sec: f64, capacity: f64) {
        let mut state = self.lock();
        state.rate_per_sec = sanitize(rate_per_sec);
        state.capacity = sanitize(capacity);
        if state.available > state.capacity {
            state.available = state.capacity;
        }
    }

    /// Records a sampling attempt and decides whether it is admitted.
    ///
    /// # Parameters
    /// * `passed` - whether the attempt got past the sample rate (or needs no draw)
    /// * `through_always` - admit without consuming a token
    /// * `count_sampled` - whether to count the attempt as sampled
    ///
    /// Attempts that did not pass are only counted.
    pub fn count(&self, passed: bool, through_always: bool, count_sampled: bool) -> bool {
        self.count_at(passed, through_always, count_sampled, Instant::now())
    }

    pub(crate) fn count_at(
        &self,
        passed: bool,
        through_always: bool,
        count_sampled: bool,
        now: Instant,
    ) -> bool {
        let mut state = self.lock();
        state.counts.requested += 1;
        if count_sampled {
            state.counts.sampled += 1;
        }
        if !passed {
            return false;
        }
        if through_always {
            state.counts.through += 1;
            return true;
        }
        let admitted = state.consume(1.0, now);
        if admitted {
            state.counts.traced += 1;
        } else {
            state.counts.limited += 1;
        }
        admitted
    }

    /// Returns the counters and resets them to zero. The balance is not affected.
    pub fn flush_counters(&self) -> RateCounts {
        std::mem::take(&mut self.lock().counts)
    }

    /// Returns the counters without resetting them
    pub fn counts(&self) -> RateCounts {
        self.lock().counts
    }

    /// Current balance, without refilling
    pub fn available(&self) -> f64 {
        self.lock().available
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.lock().rate_per_sec
    }

    pub fn capacity(&self) -> f64 {
        self.lock().capacity
    }
}
