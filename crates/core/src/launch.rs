use std::{io, net::SocketAddr, process::ExitStatus, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::migrate::CommandSpec;

/// Which web server variant is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Single-process debug server from the framework's management entry point.
    Development,
    /// Pre-fork worker pool behind the WSGI process manager.
    Production { workers: u32, timeout: Duration },
}

impl ServerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production { .. } => "production",
        }
    }
}

/// Fully resolved server command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub mode: ServerMode,
    pub bind_addr: SocketAddr,
    pub command: CommandSpec,
}

impl LaunchPlan {
    /// `<manage> runserver <bind>`.
    pub fn development(manage: &CommandSpec, bind_addr: SocketAddr) -> Self {
        Self {
            mode: ServerMode::Development,
            bind_addr,
            command: manage.with_args(["runserver".to_string(), bind_addr.to_string()]),
        }
    }

    /// `<gunicorn> <app> --bind <bind> --workers <n> --timeout <secs>`.
    pub fn production(
        gunicorn: &CommandSpec,
        wsgi_app: &str,
        bind_addr: SocketAddr,
        workers: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            mode: ServerMode::Production { workers, timeout },
            bind_addr,
            command: gunicorn.with_args([
                wsgi_app.to_string(),
                "--bind".to_string(),
                bind_addr.to_string(),
                "--workers".to_string(),
                workers.to_string(),
                "--timeout".to_string(),
                timeout.as_secs().to_string(),
            ]),
        }
    }
}

/// Hands control of the process over to the web server.
pub trait Launcher {
    /// Returns only when the hand-off did not happen or, for supervised
    /// launches, once the server has exited.
    fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError>;
}

/// Replaces the current process image with the server on Unix.
///
/// Other targets have no `exec`, so the server runs as a supervised child and
/// its exit status is propagated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecLauncher;

impl Launcher for ExecLauncher {
    #[cfg(unix)]
    fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError> {
        use std::os::unix::process::CommandExt;

        info!(stage = "launch", mode = plan.mode.as_str(), bind = %plan.bind_addr, command = %plan.command, "exec web server");
        let err = plan.command.to_std().exec();
        Err(LaunchError::from_io(&plan.command, err))
    }

    #[cfg(not(unix))]
    fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError> {
        info!(stage = "launch", mode = plan.mode.as_str(), bind = %plan.bind_addr, command = %plan.command, "starting supervised web server");
        let status = plan
            .command
            .to_std()
            .status()
            .map_err(|err| LaunchError::from_io(&plan.command, err))?;
        if status.success() {
            Ok(())
        } else {
            Err(LaunchError::Exited { status })
        }
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("server program not found: {command}")]
    NotFound { command: String },
    #[error("server program is not executable: {command}")]
    PermissionDenied { command: String },
    #[error("failed to launch server {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("server exited with {status}")]
    Exited { status: ExitStatus },
}

impl LaunchError {
    fn from_io(command: &CommandSpec, err: io::Error) -> Self {
        let command = command.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { command },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { command },
            _ => Self::Io {
                command,
                source: err,
            },
        }
    }

    /// Shell-style exit code: 127 for a missing program, 126 when it cannot run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 127,
            Self::PermissionDenied { .. } | Self::Io { .. } => 126,
            Self::Exited { status } => match status.code() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
        }
    }
}
