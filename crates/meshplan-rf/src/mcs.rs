//! Modulation and Coding Scheme table: maps an achieved SNR/SINR to a
//! discrete throughput class. Ascending by `min_snr_db`; index 0 is always
//! the zero-throughput class so an inactive or unviable link never
//! over-constrains the model.

use crate::error::{Result, RfError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McsEntry {
    pub level: u32,
    pub min_snr_db: f64,
    pub capacity_gbps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McsTable {
    entries: Vec<McsEntry>,
}

impl McsTable {
    pub fn new(entries: Vec<McsEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RfError::EmptyMcsTable);
        }
        if !entries.windows(2).all(|w| w[0].min_snr_db <= w[1].min_snr_db) {
            return Err(RfError::UnsortedMcsTable);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[McsEntry] {
        &self.entries
    }

    /// Highest MCS class whose `min_snr_db` does not exceed `snr_db`.
    pub fn mcs_for_snr(&self, snr_db: f64) -> &McsEntry {
        self.entries
            .iter()
            .rev()
            .find(|e| snr_db >= e.min_snr_db)
            .unwrap_or(&self.entries[0])
    }

    pub fn capacity_for_snr(&self, snr_db: f64) -> f64 {
        self.mcs_for_snr(snr_db).capacity_gbps
    }

    /// Entries at or above `minimum_mcs_level`, used to exclude unusably low
    /// MCS classes from a link's feasible set.
    pub fn at_or_above(&self, minimum_mcs_level: u32) -> impl Iterator<Item = &McsEntry> {
        self.entries.iter().filter(move |e| e.level >= minimum_mcs_level || e.level == 0)
    }
}
