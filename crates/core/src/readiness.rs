use std::{fmt, io, time::Duration};

use thiserror::Error;
use tokio::{
    net::TcpStream,
    time::{sleep, timeout, Instant},
};
use tracing::{info, warn};

/// Host and port of the dependency the boot sequence waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub host: String,
    pub port: u16,
}

impl DatabaseTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Bounded retry policy for the readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Pause between two failed probes.
    pub interval: Duration,
    /// Overall deadline measured from the first probe.
    pub timeout: Duration,
    /// Upper bound for a single connection attempt.
    pub probe_timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// A single connection attempt against the target.
#[allow(async_fn_in_trait)]
pub trait Probe {
    async fn probe(&self, target: &DatabaseTarget) -> io::Result<()>;
}

/// Opens a TCP connection and drops it without exchanging any data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl Probe for TcpProbe {
    async fn probe(&self, target: &DatabaseTarget) -> io::Result<()> {
        let stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
        drop(stream);
        Ok(())
    }
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("database at {target} not reachable after {attempts} attempts in {waited:?}")]
    Timeout {
        target: DatabaseTarget,
        attempts: u32,
        waited: Duration,
    },
}

/// Polls `target` until a probe succeeds or the policy deadline passes.
pub async fn wait_until_ready<P: Probe>(
    probe: &P,
    target: &DatabaseTarget,
    policy: &ReadinessPolicy,
) -> Result<Readiness, ReadinessError> {
    let started = Instant::now();
    // `None` means the deadline lies past what `Instant` can represent.
    let deadline = started.checked_add(policy.timeout);
    let mut attempts = 0u32;

    info!(stage = "readiness", %target, timeout = ?policy.timeout, "waiting for database");

    loop {
        attempts += 1;
        let budget = match deadline {
            Some(deadline) => policy
                .probe_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => policy.probe_timeout,
        };

        let result = match timeout(budget, probe.probe(target)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "probe timed out")),
        };

        match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                info!(stage = "readiness", %target, attempts, elapsed = ?elapsed, "database is reachable");
                return Ok(Readiness { attempts, elapsed });
            }
            Err(err) => {
                warn!(stage = "readiness", %target, attempt = attempts, error = %err, "database not reachable yet, retrying");
            }
        }

        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(ReadinessError::Timeout {
                    target: target.clone(),
                    attempts,
                    waited: now - started,
                });
            }
            Some(deadline) => policy.interval.min(deadline - now),
            None => policy.interval,
        };
        sleep(pause).await;
    }
}
