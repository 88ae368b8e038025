use std::{ffi::OsString, fmt, io, process::ExitStatus, process::Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

/// Program plus arguments, resolved through `PATH` like a shell would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a spec from a non-empty argv-style slice.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(
            program.as_ref(),
            args.iter().map(|arg| arg.as_ref().to_string()),
        ))
    }

    /// Returns a copy with `extra` appended to the argument list.
    pub fn with_args<I, A>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let mut spec = self.clone();
        spec.args.extend(extra.into_iter().map(Into::into));
        spec
    }

    pub(crate) fn to_std(&self) -> std::process::Command {
        let mut command = std::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// One schema command, run to completion before the next one starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    pub name: &'static str,
    pub command: CommandSpec,
}

/// Ordered list of schema commands executed once per boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    pub fn new(steps: Vec<MigrationStep>) -> Self {
        Self { steps }
    }

    /// Schema synchronization followed by migration apply, both non-interactive.
    ///
    /// `manage` is the management entry point, e.g. `python manage.py`.
    pub fn framework(manage: &CommandSpec, skip_makemigrations: bool) -> Self {
        let mut steps = Vec::with_capacity(2);
        if !skip_makemigrations {
            steps.push(MigrationStep {
                name: "makemigrations",
                command: manage.with_args(["makemigrations", "--noinput"]),
            });
        }
        steps.push(MigrationStep {
            name: "migrate",
            command: manage.with_args(["migrate", "--noinput"]),
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Runs every step in order and stops at the first failure.
    pub async fn apply(&self) -> Result<(), MigrationError> {
        for step in &self.steps {
            info!(stage = "migrate", step = step.name, command = %step.command, "running migration step");

            let mut command = Command::from(step.command.to_std());
            command
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());

            let status = command.status().await.map_err(|source| {
                error!(stage = "migrate", step = step.name, error = %source, "failed to start migration step");
                MigrationError::Spawn {
                    step: step.name,
                    source,
                }
            })?;

            if !status.success() {
                error!(stage = "migrate", step = step.name, %status, "migration step failed");
                return Err(MigrationError::Failed {
                    step: step.name,
                    status,
                });
            }
            info!(stage = "migrate", step = step.name, "migration step completed");
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to start migration step {step}: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("migration step {step} exited with {status}")]
    Failed {
        step: &'static str,
        status: ExitStatus,
    },
}

impl MigrationError {
    /// Exit code the boot process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => 1,
            Self::Failed { status, .. } => match status.code() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
        }
    }
}
