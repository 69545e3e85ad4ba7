//! Builds a `meshplan_rf::RfParams` from a device's `sector_params` section:
//! the antenna gain table (a loaded pattern file, or the closed-form
//! parabolic fallback) and the MCS table (a loaded map file, or a small
//! built-in default), plus the scalar RF constants carried straight across.

use crate::config::SectorParamsConfig;
use crate::error::{PipelineError, Result};
use meshplan_rf::gain::{GainTable, ParabolicGain, PiecewiseGainTable};
use meshplan_rf::mcs::{McsEntry, McsTable};
use meshplan_rf::RfParams;
use std::fs;
use std::sync::Arc;

/// `(min_snr_db, capacity_gbps)` steps for an 802.11ad/WiGig-class radio,
/// used when no `mcs_map_file` is configured.
const DEFAULT_MCS_STEPS: &[(f64, f64)] = &[
    (f64::NEG_INFINITY, 0.0),
    (-5.0, 0.385),
    (0.0, 0.770),
    (4.0, 1.155),
    (7.0, 1.540),
    (10.0, 2.310),
    (13.0, 3.080),
    (16.0, 3.850),
    (18.0, 4.620),
    (21.0, 5.005),
];

fn load_piecewise_gain_table(path: &std::path::Path) -> Result<PiecewiseGainTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path).map_err(PipelineError::Csv)?;
    let mut points = Vec::new();
    for record in reader.deserialize() {
        let (angle_deg, gain_db): (f64, f64) = record.map_err(PipelineError::Csv)?;
        points.push((angle_deg, gain_db));
    }
    PiecewiseGainTable::new(points).map_err(|e| PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
    })
}

fn load_mcs_table(path: &std::path::Path) -> Result<McsTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path).map_err(PipelineError::Csv)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        let entry: McsEntry = record.map_err(PipelineError::Csv)?;
        entries.push(entry);
    }
    McsTable::new(entries).map_err(|e| PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
    })
}

fn default_mcs_table() -> McsTable {
    let entries = DEFAULT_MCS_STEPS
        .iter()
        .enumerate()
        .map(|(level, &(min_snr_db, capacity_gbps))| McsEntry { level: level as u32, min_snr_db, capacity_gbps })
        .collect();
    McsTable::new(entries).expect("default MCS table is sorted and non-empty")
}

pub fn build_rf_params(sector_params: &SectorParamsConfig) -> Result<RfParams> {
    let gain_table: Arc<dyn GainTable> = match &sector_params.antenna_pattern_file {
        Some(path) => {
            let _ = fs::metadata(path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })?;
            Arc::new(load_piecewise_gain_table(path)?)
        }
        None => Arc::new(ParabolicGain::new(sector_params.antenna_boresight_gain_db, sector_params.horizontal_scan_range_deg)),
    };

    let mcs_table = match &sector_params.mcs_map_file {
        Some(path) => {
            let _ = fs::metadata(path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })?;
            load_mcs_table(path)?
        }
        None => default_mcs_table(),
    };

    Ok(RfParams {
        carrier_frequency_hz: sector_params.carrier_frequency_hz,
        thermal_noise_power_dbm: sector_params.thermal_noise_power_dbm,
        noise_figure_db: sector_params.noise_figure_db,
        tx_diversity_gain_db: sector_params.tx_diversity_gain_db,
        rx_diversity_gain_db: sector_params.rx_diversity_gain_db,
        tx_misc_loss_db: sector_params.tx_misc_loss_db,
        rx_misc_loss_db: sector_params.rx_misc_loss_db,
        minimum_mcs_level: sector_params.minimum_mcs_level,
        horizontal_scan_range_deg: sector_params.horizontal_scan_range_deg,
        gain_table,
        mcs_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_usable_rf_params() {
        let cfg = SectorParamsConfig::default();
        let rf = build_rf_params(&cfg).unwrap();
        assert!(rf.mcs_table.capacity_for_snr(30.0) > 0.0);
        assert_eq!(rf.mcs_table.capacity_for_snr(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn missing_pattern_file_is_an_io_error() {
        let mut cfg = SectorParamsConfig::default();
        cfg.antenna_pattern_file = Some("/nonexistent/pattern.csv".into());
        assert!(build_rf_params(&cfg).is_err());
    }
}
