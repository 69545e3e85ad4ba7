//! RF parameters consumed by the interference engine. `meshplan-pipeline`
//! builds one of these from its `sector_params` configuration section per
//! device SKU.

use crate::gain::GainTable;
use crate::mcs::McsTable;
use std::sync::Arc;

#[derive(Clone)]
pub struct RfParams {
    pub carrier_frequency_hz: f64,
    pub thermal_noise_power_dbm: f64,
    pub noise_figure_db: f64,
    pub tx_diversity_gain_db: f64,
    pub rx_diversity_gain_db: f64,
    pub tx_misc_loss_db: f64,
    pub rx_misc_loss_db: f64,
    pub minimum_mcs_level: u32,
    pub horizontal_scan_range_deg: f64,
    pub gain_table: Arc<dyn GainTable>,
    pub mcs_table: McsTable,
}

impl RfParams {
    /// Combined miscellaneous loss subtracted once per link (not once per
    /// interferer): `tx_and_rx_misc_loss` in the net-gain formula.
    pub fn tx_and_rx_misc_loss_db(&self) -> f64 {
        self.tx_misc_loss_db + self.rx_misc_loss_db
    }

    pub fn noise_floor_dbm(&self) -> f64 {
        self.thermal_noise_power_dbm + self.noise_figure_db
    }
}

impl std::fmt::Debug for RfParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RfParams")
            .field("carrier_frequency_hz", &self.carrier_frequency_hz)
            .field("thermal_noise_power_dbm", &self.thermal_noise_power_dbm)
            .field("noise_figure_db", &self.noise_figure_db)
            .field("minimum_mcs_level", &self.minimum_mcs_level)
            .field("horizontal_scan_range_deg", &self.horizontal_scan_range_deg)
            .finish()
    }
}
