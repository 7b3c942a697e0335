// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Retry policies decide, from the outcome of the last attempt, whether and
//! when the next attempt is sent.
//!
//! A policy is a pure function of [`RetryContext`]: it keeps no state across
//! calls, so one instance is shared by every operation of a client.

use std::fmt::Debug;
use std::time::Duration;

use http::StatusCode;
use rand::Rng;

use crate::*;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: usize = 4;
/// Default exponential delta.
pub const DEFAULT_EXPONENTIAL_DELTA: Duration = Duration::from_secs(4);
/// Default fixed delay of [`LinearRetry`].
pub const DEFAULT_LINEAR_DELTA: Duration = Duration::from_secs(30);
/// Default minimum backoff of [`ExponentialRetry`].
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(3);
/// Default upper bound of any backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);

/// RetryContext describes the attempt that just failed with a temporary error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// Number of retries already made, `0` after the first attempt failed.
    pub retry_count: usize,
    /// Status code of the last response, `None` for network errors and timeouts.
    pub last_status: Option<StatusCode>,
    /// Location the last attempt was sent to.
    pub last_location: StorageLocation,
    /// Location mode currently in effect.
    pub location_mode: LocationMode,
    /// Set once the secondary answered `404`, the object has not been
    /// replicated yet and only the primary can serve it.
    pub secondary_not_found: bool,
}

/// RetryInfo is a positive retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryInfo {
    /// Location of the next attempt.
    pub target_location: StorageLocation,
    /// Location mode for the rest of the operation.
    pub updated_mode: LocationMode,
    /// Time to wait before the next attempt.
    pub interval: Duration,
}

/// RetryPolicy decides whether a failed attempt is retried.
///
/// Only temporary failures reach a policy, permanent ones are returned by
/// the engine directly.
pub trait RetryPolicy: Debug + Send + Sync + 'static {
    /// Evaluate the last attempt, `None` means give up.
    fn evaluate(&self, ctx: &RetryContext) -> Option<RetryInfo>;
}

/// Pick location and mode of the next attempt.
fn next_location(ctx: &RetryContext) -> (StorageLocation, LocationMode) {
    if ctx.secondary_not_found && ctx.location_mode.uses_secondary() {
        return (StorageLocation::Primary, LocationMode::PrimaryOnly);
    }

    if ctx.location_mode.is_alternating() {
        (ctx.last_location.flip(), ctx.location_mode)
    } else {
        (ctx.location_mode.initial_location(), ctx.location_mode)
    }
}

/// ExponentialRetry waits `min_backoff + (2^retry_count - 1) * delta`
/// between attempts, capped at `max_backoff`.
///
/// The plain `(2^retry_count - 1) * delta` curve would retry the first
/// failure immediately, so the default `min_backoff` of 3s is added on top:
/// the defaults wait 3s, 7s and 15s. Set `min_backoff` to zero for the plain
/// curve.
///
/// Jitter is off by default so intervals are deterministic.
/// [`ExponentialRetry::with_jitter`] scales `delta` by a random factor in
/// `[0.8, 1.2]`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRetry {
    max_attempts: usize,
    delta: Duration,
    min_backoff: Duration,
    max_backoff: Duration,
    jitter: bool,
}

impl Default for ExponentialRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delta: DEFAULT_EXPONENTIAL_DELTA,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: false,
        }
    }
}

impl ExponentialRetry {
    /// Create a policy with given delta and max attempts.
    pub fn new(delta: Duration, max_attempts: usize) -> Self {
        Self {
            delta,
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the minimum backoff.
    pub fn with_min_backoff(mut self, min_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self
    }

    /// Set the maximum backoff.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Scale delta by a random factor in `[0.8, 1.2]` on every evaluation.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn backoff(&self, retry_count: usize) -> Duration {
        let delta = if self.jitter {
            self.delta.mul_f64(rand::thread_rng().gen_range(0.8..=1.2))
        } else {
            self.delta
        };

        // Clamp the exponent, the result is capped by max_backoff anyway.
        let factor = 2u32
            .checked_pow(retry_count.min(31) as u32)
            .map_or(u32::MAX, |v| v - 1);
        let increment = delta.checked_mul(factor).unwrap_or(self.max_backoff);

        self.min_backoff
            .saturating_add(increment)
            .min(self.max_backoff)
    }
}

impl RetryPolicy for ExponentialRetry {
    fn evaluate(&self, ctx: &RetryContext) -> Option<RetryInfo> {
        if ctx.retry_count + 1 >= self.max_attempts {
            return None;
        }

        let (target_location, updated_mode) = next_location(ctx);
        Some(RetryInfo {
            target_location,
            updated_mode,
            interval: self.backoff(ctx.retry_count),
        })
    }
}

/// LinearRetry waits a constant `delta` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct LinearRetry {
    max_attempts: usize,
    delta: Duration,
    max_backoff: Duration,
}

impl Default for LinearRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delta: DEFAULT_LINEAR_DELTA,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl LinearRetry {
    /// Create a policy with given delta and max attempts.
    pub fn new(delta: Duration, max_attempts: usize) -> Self {
        Self {
            delta,
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the maximum backoff.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

impl RetryPolicy for LinearRetry {
    fn evaluate(&self, ctx: &RetryContext) -> Option<RetryInfo> {
        if ctx.retry_count + 1 >= self.max_attempts {
            return None;
        }

        let (target_location, updated_mode) = next_location(ctx);
        Some(RetryInfo {
            target_location,
            updated_mode,
            interval: self.delta.min(self.max_backoff),
        })
    }
}

/// NoRetry never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn evaluate(&self, _: &RetryContext) -> Option<RetryInfo> {
        None
    }
}
