//! `system_params`: process-level knobs — output location, debug dumps and
//! logging — as opposed to anything that shapes the optimization itself.

use super::enum_helpers;
use meshplan_core::enums::LoggerLevel;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemParamsConfig {
    pub output_dir: PathBuf,
    pub debug_mode: bool,
    #[serde(deserialize_with = "enum_helpers::logger_level")]
    pub logger_level: LoggerLevel,
    pub log_file: Option<PathBuf>,
    pub log_to_stderr: bool,
}

impl Default for SystemParamsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            debug_mode: false,
            logger_level: LoggerLevel::Info,
            log_file: None,
            log_to_stderr: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SystemParamsConfig::default();
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
        assert!(!cfg.debug_mode);
        assert!(cfg.log_to_stderr);
    }
}
