//! Start-up sequence for the portal web container: wait for the database,
//! apply schema migrations, then hand the process over to the web server.

pub mod launch;
pub mod migrate;
pub mod orchestrator;
pub mod readiness;

pub use launch::{ExecLauncher, LaunchError, LaunchPlan, Launcher, ServerMode};
pub use migrate::{CommandSpec, MigrationError, MigrationPlan, MigrationStep};
pub use orchestrator::{
    BootError, BootPlan, Orchestrator, INTERRUPTED_EXIT_CODE, READINESS_TIMEOUT_EXIT_CODE,
};
pub use readiness::{
    wait_until_ready, DatabaseTarget, Probe, Readiness, ReadinessError, ReadinessPolicy, TcpProbe,
};
