//! Bounded-time polling of long-running operations
//!
//! Some cloud operations (blob copy) return before the work is done and
//! report progress through a status field. [`OperationPoller`] re-reads that
//! status until it reaches the success sentinel or the time budget runs out.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Default pause between status reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const SUCCESS_STATUS: &str = "success";
pub const PENDING_STATUS: &str = "pending";

/// Final result of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The operation reported success
    Success,
    /// The budget ran out while the operation was still pending
    Pending,
    /// The budget ran out in some other state
    Unknown,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success)
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Success => write!(f, "success"),
            PollOutcome::Pending => write!(f, "pending"),
            PollOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// Delay strategy between status reads
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same pause every time
    Constant(Duration),
    /// Pause grows by `multiplier` per attempt, capped at `max`
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Constant(DEFAULT_POLL_INTERVAL)
    }
}

impl Backoff {
    /// Delay after the given zero-based attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Constant(interval) => *interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = normalize_multiplier(*multiplier)
                    .powi(attempt.min(i32::MAX as u32) as i32);
                let delay = initial.as_secs_f64() * factor;
                if !delay.is_finite() || delay >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(delay.max(0.0))
                }
            }
        }
    }
}

/// A pause never shrinks between attempts
fn normalize_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

/// Something that can report the current status of an operation
#[async_trait]
pub trait StatusQuery: Send {
    /// Read the status field once. Errors mean the query itself is broken.
    async fn status(&mut self) -> Result<String>;
}

/// Waits for an operation to reach the success status within a timeout
#[derive(Debug, Clone)]
pub struct OperationPoller {
    timeout: Duration,
    backoff: Backoff,
    success: String,
    pending: String,
}

impl OperationPoller {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            backoff: Backoff::default(),
            success: SUCCESS_STATUS.to_string(),
            pending: PENDING_STATUS.to_string(),
        }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        self.with_backoff(Backoff::Constant(interval))
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = match backoff {
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => Backoff::Exponential {
                initial: initial.min(max),
                max,
                multiplier: normalize_multiplier(multiplier),
            },
            constant => constant,
        };
        self
    }

    pub fn with_sentinels(mut self, success: impl Into<String>, pending: impl Into<String>) -> Self {
        self.success = success.into();
        self.pending = pending.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `query` until success or until the deadline passes.
    ///
    /// The first read happens immediately. Inside the loop a success read
    /// returns at once; otherwise the poller sleeps per its backoff. Once the
    /// deadline passes, the last observed status decides between
    /// [`PollOutcome::Pending`] and [`PollOutcome::Unknown`].
    pub async fn poll<Q>(&self, query: &mut Q) -> Result<PollOutcome>
    where
        Q: StatusQuery + ?Sized,
    {
        let deadline = Instant::now() + self.timeout;
        let mut status = query.status().await?;
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            status = query.status().await?;
            tracing::debug!("Operation status: {} (attempt {})", status, attempt + 1);

            if status == self.success {
                return Ok(PollOutcome::Success);
            }

            sleep(self.backoff.delay_for_attempt(attempt)).await;
            attempt += 1;
        }

        let outcome = self.classify(&status);
        tracing::debug!("Poll deadline reached, last status {} -> {}", status, outcome);
        Ok(outcome)
    }

    fn classify(&self, status: &str) -> PollOutcome {
        if status == self.success {
            PollOutcome::Success
        } else if status == self.pending {
            PollOutcome::Pending
        } else {
            PollOutcome::Unknown
        }
    }
}
