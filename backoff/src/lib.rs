//! Exponential backoff with jitter.
//!
//! A compare-and-swap step never retries on its own: a CAS conflict is a
//! normal `false` return, and the caller decides whether and how to try
//! again. This crate is the retry driver a caller plugs in around a flush
//! attempt.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::clone_on_ref_ptr
)]

use observability_deps::tracing::info;
use rand::Rng;
use std::time::Duration;

/// Configuration for [`RetryLoop`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Smallest backoff handed out.
    pub min_backoff: Duration,
    /// Largest backoff handed out, regardless of how many rounds have run.
    pub max_backoff: Duration,
    /// Growth factor applied to the backoff ceiling each round.
    pub growth: f64,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(10),
            growth: 2.0,
            max_attempts: Some(10),
        }
    }
}

/// Outcome of exhausting [`RetryConfig::max_attempts`] without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetriesExhausted {
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

/// Drives repeated attempts at a fallible, CAS-shaped operation, sleeping
/// with exponential backoff and full jitter between attempts.
#[derive(Debug)]
pub struct RetryLoop {
    config: RetryConfig,
    ceiling_secs: f64,
    attempt: u32,
}

impl RetryLoop {
    /// Create a new loop from the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        let ceiling_secs = config.min_backoff.as_secs_f64();
        Self {
            config,
            ceiling_secs,
            attempt: 0,
        }
    }

    /// Run `attempt_fn` until it returns `Ok(true)` (success), `Err(e)`
    /// (propagated immediately, e.g. a non-CAS store error), or the attempt
    /// budget is exhausted.
    ///
    /// `attempt_fn` should return `Ok(false)` for a CAS conflict (a normal
    /// boolean outcome, not an error) and `Ok(true)` once the operation
    /// lands.
    pub async fn run<F, Fut, E>(mut self, task_name: &str, mut attempt_fn: F) -> Result<(), E>
    where
        F: FnMut() -> Fut,
        E: From<RetriesExhausted>,
        Fut: std::future::Future<Output = Result<bool, E>>,
    {
        loop {
            self.attempt += 1;
            if attempt_fn().await? {
                return Ok(());
            }

            if let Some(max) = self.config.max_attempts {
                if self.attempt >= max {
                    return Err(RetriesExhausted {
                        attempts: self.attempt,
                    }
                    .into());
                }
            }

            let sleep_for = self.next_delay();
            info!(
                task_name,
                attempt = self.attempt,
                backoff_ms = sleep_for.as_millis() as u64,
                "CAS conflict, backing off before retry",
            );
            tokio::time::sleep(sleep_for).await;
        }
    }

    fn next_delay(&mut self) -> Duration {
        let next_ceiling = (self.ceiling_secs * self.config.growth)
            .min(self.config.max_backoff.as_secs_f64());
        let min = self.config.min_backoff.as_secs_f64();
        let jittered = rand::thread_rng().gen_range(min..=self.ceiling_secs.max(min));
        self.ceiling_secs = next_ceiling;
        Duration::from_secs_f64(jittered)
    }
}
