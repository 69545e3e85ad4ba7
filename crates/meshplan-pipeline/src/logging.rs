//! Logging setup. Mirrors the driver-binary pattern used elsewhere in this
//! workspace (`tracing_subscriber::FmtSubscriber` + `set_global_default`),
//! generalized to read its level from `system_params.logger_level` and
//! optionally mirror output to a log file in addition to stderr.

use crate::config::SystemParamsConfig;
use meshplan_core::enums::LoggerLevel;
use std::fs::OpenOptions;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn level_for(logger_level: LoggerLevel) -> Level {
    match logger_level {
        LoggerLevel::NotSet | LoggerLevel::Debug => Level::DEBUG,
        LoggerLevel::Info => Level::INFO,
        LoggerLevel::Warning => Level::WARN,
        LoggerLevel::Error | LoggerLevel::Critical => Level::ERROR,
    }
}

/// Installs the global `tracing` subscriber. Call once, at process startup,
/// before the first `tracing::span!`/`info!` call in the driver.
pub fn init_logging(config: &SystemParamsConfig) -> anyhow::Result<()> {
    let level = level_for(config.logger_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_max_level(level);

    if let Some(log_file) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        builder.with_writer(file).with_ansi(false).try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping_is_monotone() {
        assert_eq!(level_for(LoggerLevel::Debug), Level::DEBUG);
        assert_eq!(level_for(LoggerLevel::Info), Level::INFO);
        assert_eq!(level_for(LoggerLevel::Warning), Level::WARN);
        assert_eq!(level_for(LoggerLevel::Critical), Level::ERROR);
    }
}
