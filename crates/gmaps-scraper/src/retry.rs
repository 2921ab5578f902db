//! Racing two page conditions with an escalating timeout.
//!
//! The search page shows either a consent dialog or the results feed first,
//! and which one wins depends on region and cookies. [`race_with_escalation`]
//! waits for both at once; when neither shows up within the attempt's
//! timeout, the next attempt waits longer.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Attempt count and timeout schedule for [`race_with_escalation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacePolicy {
    pub attempts: u32,
    pub base_timeout: Duration,
    pub multiplier: u32,
}

impl RacePolicy {
    #[must_use]
    pub fn new(attempts: u32, base_timeout: Duration) -> Self {
        Self {
            attempts,
            base_timeout,
            multiplier: 2,
        }
    }

    /// Timeout for the zero-based `attempt`: `base * multiplier^attempt`.
    ///
    /// | Attempt | Timeout (base 5 s, ×2) |
    /// |---------|------------------------|
    /// | 0       | 5 s                    |
    /// | 1       | 10 s                   |
    /// | 2       | 20 s                   |
    #[must_use]
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_timeout.saturating_mul(factor)
    }
}

/// Which of the two raced conditions completed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    First,
    Second,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("neither condition completed within {attempts} attempts")]
pub struct RaceExhausted {
    pub attempts: u32,
}

/// Runs `first` and `second` concurrently, returning whichever succeeds
/// first.
///
/// Each factory receives the attempt's timeout and returns a future that
/// resolves `Ok` once its condition holds. A branch that fails is dropped
/// from the attempt while the other keeps running. The whole attempt is also
/// bounded by the timeout, so a branch that ignores it cannot stall the race.
/// When both branches fail, the next attempt starts with a longer timeout.
///
/// # Errors
///
/// Returns [`RaceExhausted`] once every attempt has passed without either
/// branch succeeding.
pub async fn race_with_escalation<F1, Fut1, F2, Fut2, E>(
    policy: &RacePolicy,
    mut first: F1,
    mut second: F2,
) -> Result<Race, RaceExhausted>
where
    F1: FnMut(Duration) -> Fut1,
    Fut1: Future<Output = Result<(), E>>,
    F2: FnMut(Duration) -> Fut2,
    Fut2: Future<Output = Result<(), E>>,
    E: Display,
{
    for attempt in 0..policy.attempts {
        let timeout = policy.timeout_for(attempt);
        let first_fut = tokio::time::timeout(timeout, first(timeout));
        let second_fut = tokio::time::timeout(timeout, second(timeout));
        tokio::pin!(first_fut);
        tokio::pin!(second_fut);

        let mut first_live = true;
        let mut second_live = true;
        let winner = loop {
            tokio::select! {
                result = &mut first_fut, if first_live => match result {
                    Ok(Ok(())) => break Some(Race::First),
                    Ok(Err(err)) => {
                        tracing::debug!(attempt, error = %err, "first race branch failed");
                        first_live = false;
                    }
                    Err(_) => first_live = false,
                },
                result = &mut second_fut, if second_live => match result {
                    Ok(Ok(())) => break Some(Race::Second),
                    Ok(Err(err)) => {
                        tracing::debug!(attempt, error = %err, "second race branch failed");
                        second_live = false;
                    }
                    Err(_) => second_live = false,
                },
                else => break None,
            }
        };

        if let Some(winner) = winner {
            return Ok(winner);
        }

        tracing::warn!(
            attempt = attempt + 1,
            attempts = policy.attempts,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "neither condition appeared, escalating timeout"
        );
    }

    Err(RaceExhausted {
        attempts: policy.attempts,
    })
}
