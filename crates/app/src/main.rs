mod plan;
mod telemetry;

use std::process::ExitCode;

use portal_boot_core::{ExecLauncher, Orchestrator, TcpProbe};
use portal_boot_util::{load_env_file, BootConfig};
use tracing::{error, info, warn};

/// EX_CONFIG from sysexits.h.
const CONFIG_EXIT_CODE: u8 = 78;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    load_env_file();
    let config = match BootConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("portal-boot: configuration error: {err}");
            return ExitCode::from(CONFIG_EXIT_CODE);
        }
    };

    if let Err(err) = telemetry::init_tracing(&config) {
        eprintln!("portal-boot: {err}");
        return ExitCode::FAILURE;
    }

    let boot_plan = match plan::boot_plan(&config) {
        Ok(boot_plan) => boot_plan,
        Err(err) => {
            error!(stage = "config", error = %err, "invalid boot configuration");
            return ExitCode::from(CONFIG_EXIT_CODE);
        }
    };

    info!(
        stage = "boot",
        env = %config.environment.as_str(),
        target = %boot_plan.target,
        bind = %boot_plan.server.bind_addr,
        "starting boot sequence"
    );

    let orchestrator = Orchestrator::new(boot_plan, TcpProbe, ExecLauncher);
    match orchestrator.run_until(shutdown_signal()).await {
        Ok(()) => {
            info!(stage = "boot", "server exited");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err.exit_code();
            error!(stage = err.stage(), error = %err, exit_code = code, "boot sequence failed");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Resolves on SIGTERM or Ctrl-C.
///
/// As PID 1 the process gets no default SIGTERM action, so without this a
/// container stop would hang in the readiness wait. `exec` resets the handlers
/// before the server starts.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(stage = "boot", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(stage = "boot", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
