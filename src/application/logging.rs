use crate::infrastructure::error::InfraError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

pub const LOG_FILE_NAME: &str = "dayplan.log";
const DEFAULT_LOG_DIRECTIVES: &str = "info,dayplan_scheduler=debug";

/// Installs the stdout and daily-rolling file subscribers once per process.
pub fn init_logging(logs_dir: &Path) -> Result<(), InfraError> {
    LOGGER_INIT
        .get_or_try_init(|| -> Result<(), InfraError> {
            std::fs::create_dir_all(logs_dir)?;

            let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
                .map_err(|error| {
                    InfraError::InvalidConfig(format!("invalid log directives: {error}"))
                })?;

            LOGGER_GUARD
                .set(guard)
                .map_err(|_| InfraError::InvalidConfig("logging already initialized".to_string()))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .try_init()
                .map_err(|error| {
                    InfraError::InvalidConfig(format!("failed to install log subscriber: {error}"))
                })?;

            Ok(())
        })
        .map(|_| ())
}
