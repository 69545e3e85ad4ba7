//! `sector_params`: the RF/antenna record attached to each device SKU.

use super::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectorParamsConfig {
    pub antenna_boresight_gain_db: f64,
    pub minimum_tx_power_dbm: f64,
    pub maximum_tx_power_dbm: f64,
    pub number_sectors_per_node: u32,
    pub horizontal_scan_range_deg: f64,
    pub carrier_frequency_hz: f64,
    pub thermal_noise_power_dbm: f64,
    pub noise_figure_db: f64,
    pub rain_rate: f64,
    pub link_availability_percentage: f64,
    pub tx_diversity_gain_db: f64,
    pub rx_diversity_gain_db: f64,
    pub tx_misc_loss_db: f64,
    pub rx_misc_loss_db: f64,
    pub minimum_mcs_level: u32,
    pub antenna_pattern_file: Option<PathBuf>,
    pub scan_pattern_file: Option<PathBuf>,
    pub mcs_map_file: Option<PathBuf>,
}

impl Default for SectorParamsConfig {
    fn default() -> Self {
        Self {
            antenna_boresight_gain_db: 30.0,
            minimum_tx_power_dbm: 0.0,
            maximum_tx_power_dbm: 23.0,
            number_sectors_per_node: 1,
            horizontal_scan_range_deg: 90.0,
            carrier_frequency_hz: 60e9,
            thermal_noise_power_dbm: -81.0,
            noise_figure_db: 7.0,
            rain_rate: 0.0,
            link_availability_percentage: 99.9,
            tx_diversity_gain_db: 0.0,
            rx_diversity_gain_db: 0.0,
            tx_misc_loss_db: 1.0,
            rx_misc_loss_db: 1.0,
            minimum_mcs_level: 0,
            antenna_pattern_file: None,
            scan_pattern_file: None,
            mcs_map_file: None,
        }
    }
}

impl SectorParamsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=360.0).contains(&self.horizontal_scan_range_deg) {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "horizontal_scan_range_deg",
                constraint: "in [0, 360]",
                value: self.horizontal_scan_range_deg.to_string(),
            });
        }
        if self.carrier_frequency_hz <= 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "carrier_frequency_hz",
                constraint: "positive",
                value: self.carrier_frequency_hz.to_string(),
            });
        }
        if self.noise_figure_db < 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "noise_figure_db",
                constraint: "non-negative",
                value: self.noise_figure_db.to_string(),
            });
        }
        if self.rain_rate < 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "rain_rate",
                constraint: "non-negative",
                value: self.rain_rate.to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.link_availability_percentage) {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "link_availability_percentage",
                constraint: "in [0, 100]",
                value: self.link_availability_percentage.to_string(),
            });
        }
        if self.tx_diversity_gain_db < 0.0 || self.rx_diversity_gain_db < 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "tx_rx_diversity_gain_db",
                constraint: "non-negative",
                value: format!("{}/{}", self.tx_diversity_gain_db, self.rx_diversity_gain_db),
            });
        }
        if self.tx_misc_loss_db < 0.0 || self.rx_misc_loss_db < 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "sector_params",
                field: "tx_rx_misc_loss_db",
                constraint: "non-negative",
                value: format!("{}/{}", self.tx_misc_loss_db, self.rx_misc_loss_db),
            });
        }
        Ok(())
    }
}
