//! RF interference engine and link-budget math: antenna gain tables, MCS
//! lookup, and the per-link received-interference computation consumed by
//! the min-interference MILP stage.
#![forbid(unsafe_code)]

pub mod error;
pub mod gain;
pub mod interference;
pub mod mcs;
pub mod params;
pub mod polarity;
pub mod reorient;

pub use error::{Result, RfError};
pub use gain::{GainTable, ParabolicGain, PiecewiseGainTable};
pub use interference::{compute_interference, InterferenceContribution, InterferenceResult};
pub use mcs::{McsEntry, McsTable};
pub use params::RfParams;
pub use reorient::{reorient_sectors, ReorientOutcome};
