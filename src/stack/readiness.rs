//! Readiness probing
//!
//! The dependency contract of a plain composition is "container started",
//! which races against the dependency's internal initialization: a
//! database accepts TCP connections well after its process begins. The
//! probe here closes that gap by polling the dependency's declared port
//! with bounded retries and exponential backoff before a dependent is
//! allowed to start.

use crate::error::{BerthError, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Readiness probe policy
#[derive(Debug, Clone)]
pub struct ReadyPolicy {
    /// Maximum number of connection attempts
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt
    pub initial_delay: Duration,
    /// Upper bound for the backoff delay
    pub max_delay: Duration,
    /// Timeout for each individual connection attempt
    pub connect_timeout: Duration,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(3200),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl ReadyPolicy {
    /// The delay schedule between attempts.
    ///
    /// There are `max_attempts - 1` gaps; each doubles the previous,
    /// capped at `max_delay`.
    pub fn backoff_delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.initial_delay;
        for _ in 1..self.max_attempts {
            delays.push(delay.min(self.max_delay));
            delay = delay.saturating_mul(2);
        }
        delays
    }
}

/// Report of a successful readiness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReport {
    /// Address that answered
    pub addr: String,
    /// Number of attempts used
    pub attempts: u32,
}

/// Wait until a TCP endpoint accepts connections.
///
/// Returns after the first successful connect, or with
/// [`BerthError::NotReady`] once the attempt budget is spent. Every
/// attempt is bounded by `connect_timeout`, so the overall wait is
/// bounded too.
pub async fn wait_ready(addr: &str, policy: &ReadyPolicy) -> Result<ReadyReport> {
    if policy.max_attempts == 0 {
        return Err(BerthError::InvalidConfig(
            "Readiness policy must allow at least one attempt".to_string(),
        ));
    }

    let mut last_error = String::new();
    let delays = policy.backoff_delays();

    for attempt in 1..=policy.max_attempts {
        match tokio::time::timeout(policy.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                debug!("{} ready after {} attempt(s)", addr, attempt);
                return Ok(ReadyReport {
                    addr: addr.to_string(),
                    attempts: attempt,
                });
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
            }
            Err(_) => {
                last_error = format!("connect timed out after {:?}", policy.connect_timeout);
            }
        }

        if let Some(delay) = delays.get((attempt - 1) as usize) {
            debug!(
                "{} not ready (attempt {}/{}): {}; retrying in {:?}",
                addr, attempt, policy.max_attempts, last_error, delay
            );
            tokio::time::sleep(*delay).await;
        }
    }

    warn!(
        "{} still not ready after {} attempts: {}",
        addr, policy.max_attempts, last_error
    );

    Err(BerthError::NotReady {
        addr: addr.to_string(),
        message: last_error,
    })
}
