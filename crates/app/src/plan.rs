use portal_boot_core::{
    BootPlan, CommandSpec, DatabaseTarget, LaunchPlan, MigrationPlan, ReadinessPolicy,
};
use portal_boot_util::{BootConfig, ConfigError};

/// Translates environment configuration into the concrete boot sequence.
pub fn boot_plan(config: &BootConfig) -> Result<BootPlan, ConfigError> {
    let database = &config.database;
    let manage = CommandSpec::from_argv(&config.management.manage_cmd)
        .ok_or(ConfigError::EmptyValue("MANAGE_CMD"))?;

    let server = &config.server;
    let launch = if config.environment.is_production() {
        let gunicorn = CommandSpec::from_argv(&server.gunicorn_cmd)
            .ok_or(ConfigError::EmptyValue("GUNICORN_CMD"))?;
        LaunchPlan::production(
            &gunicorn,
            &server.wsgi_app,
            server.bind_addr,
            server.workers,
            server.request_timeout,
        )
    } else {
        LaunchPlan::development(&manage, server.bind_addr)
    };

    Ok(BootPlan {
        target: DatabaseTarget::new(database.host.clone(), database.port),
        readiness: ReadinessPolicy {
            interval: database.wait_interval,
            timeout: database.wait_timeout,
            probe_timeout: database.probe_timeout,
        },
        migrations: MigrationPlan::framework(&manage, config.management.skip_makemigrations),
        server: launch,
    })
}
