//! Bounded retry policy and human-like pacing.
//!
//! Every retry loop in the crate (profile lookup, download attempts) is driven
//! by a [`RetryPolicy`]: a fixed attempt cap plus a [`Pacing`] pause between
//! attempts. The success predicate stays at the call site:
//!
//! ```rust
//! use scholarmail::retry::{Pacing, RetryPolicy};
//!
//! # async fn demo() {
//! let policy = RetryPolicy::new(3, Pacing::NONE);
//! let mut found = false;
//! for attempt in policy.attempts() {
//!     found = attempt.number == 2;
//!     if found || attempt.is_last {
//!         break;
//!     }
//!     policy.backoff().await;
//! }
//! assert!(found);
//! # }
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A pause of uniformly random length in `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pacing {
    /// No pause
    pub const NONE: Pacing = Pacing { min_ms: 0, max_ms: 0 };

    pub const fn fixed_secs(secs: u64) -> Self {
        Self {
            min_ms: secs * 1000,
            max_ms: secs * 1000,
        }
    }

    pub const fn between_secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    /// Draw one delay. A reversed range is treated as fixed at `min_ms`.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    /// Sleep for one sampled delay.
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// One numbered attempt handed out by [`RetryPolicy::attempts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,
    /// Whether no further attempt follows
    pub is_last: bool,
}

/// Fixed-cap retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Pacing,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, backoff: Pacing) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts `1..=max_attempts`, the last one flagged.
    pub fn attempts(&self) -> impl Iterator<Item = Attempt> {
        let max = self.max_attempts;
        (1..=max).map(move |number| Attempt {
            number,
            is_last: number == max,
        })
    }

    /// Pause between two attempts.
    pub async fn backoff(&self) {
        self.backoff.pause().await;
    }
}
