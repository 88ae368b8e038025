use std::future::{self, Future};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    launch::{LaunchError, LaunchPlan, Launcher},
    migrate::{MigrationError, MigrationPlan},
    readiness::{wait_until_ready, DatabaseTarget, Probe, ReadinessError, ReadinessPolicy},
};

/// Exit code used when the database never became reachable (EX_UNAVAILABLE).
pub const READINESS_TIMEOUT_EXIT_CODE: i32 = 69;
/// 128 + SIGTERM, the status a shell reports for a terminated process.
pub const INTERRUPTED_EXIT_CODE: i32 = 143;

/// Everything the boot sequence needs, resolved up front.
#[derive(Debug, Clone)]
pub struct BootPlan {
    pub target: DatabaseTarget,
    pub readiness: ReadinessPolicy,
    pub migrations: MigrationPlan,
    pub server: LaunchPlan,
}

/// Runs readiness wait, migrations and server hand-off strictly in that order.
pub struct Orchestrator<P, L> {
    plan: BootPlan,
    probe: P,
    launcher: L,
}

impl<P: Probe, L: Launcher> Orchestrator<P, L> {
    pub fn new(plan: BootPlan, probe: P, launcher: L) -> Self {
        Self {
            plan,
            probe,
            launcher,
        }
    }

    pub fn plan(&self) -> &BootPlan {
        &self.plan
    }

    /// With an exec launcher this only returns on failure.
    pub async fn run(&self) -> Result<(), BootError> {
        self.run_until(future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up once `shutdown` resolves.
    ///
    /// A shutdown during the readiness wait aborts it immediately. Migrations
    /// already started run to completion, and the server is not launched
    /// afterwards.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<(), BootError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let readiness = tokio::select! {
            result = wait_until_ready(&self.probe, &self.plan.target, &self.plan.readiness) => result?,
            () = &mut shutdown => {
                warn!(stage = "boot", "shutdown requested while waiting for database");
                return Err(BootError::Interrupted { stage: "readiness" });
            }
        };
        info!(stage = "boot", attempts = readiness.attempts, "database ready, applying migrations");

        let apply = self.plan.migrations.apply();
        tokio::pin!(apply);
        tokio::select! {
            result = &mut apply => result?,
            () = &mut shutdown => {
                warn!(stage = "boot", "shutdown requested, letting migrations finish before exiting");
                apply.await?;
                return Err(BootError::Interrupted { stage: "migrate" });
            }
        }
        info!(stage = "boot", steps = self.plan.migrations.steps().len(), "migrations applied, launching server");

        self.launcher.launch(&self.plan.server)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("shutdown requested during {stage}")]
    Interrupted { stage: &'static str },
}

impl BootError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Readiness(_) => READINESS_TIMEOUT_EXIT_CODE,
            Self::Migration(err) => err.exit_code(),
            Self::Launch(err) => err.exit_code(),
            Self::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Readiness(_) => "readiness",
            Self::Migration(_) => "migrate",
            Self::Launch(_) => "launch",
            Self::Interrupted { stage } => *stage,
        }
    }
}
