//! Layered configuration: built-in defaults, overridden by an optional file,
//! overridden by `MESHPLAN_`-prefixed environment variables. Every section
//! validates itself with a hand-written `validate()` rather than folding
//! range checks into `Deserialize`, so a malformed file reports which field
//! is wrong instead of a generic parse failure.

mod device;
mod enum_helpers;
mod error;
mod optimizer_params;
mod sector_params;
mod system_params;

pub use device::DeviceConfig;
pub use error::{ConfigError, Result};
pub use optimizer_params::{OptimizerParamsConfig, StageBudgetConfig, StageBudgetsConfig};
pub use sector_params::SectorParamsConfig;
pub use system_params::SystemParamsConfig;

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlannerConfig {
    pub devices: Vec<DeviceConfig>,
    pub optimizer_params: OptimizerParamsConfig,
    pub system_params: SystemParamsConfig,
}

impl PlannerConfig {
    /// Loads defaults, then an optional file, then `MESHPLAN_`-prefixed
    /// environment variables, in that order of increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("MESHPLAN")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder.build()?;
        let parsed: Self = raw.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        device::validate_device_list(&self.devices)?;
        self.optimizer_params.validate()?;
        Ok(())
    }
}
