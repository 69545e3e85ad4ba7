use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RfError {
    #[error("gain table has no control points")]
    EmptyGainTable,

    #[error("mcs table has no entries")]
    EmptyMcsTable,

    #[error("mcs table is not sorted by ascending min_snr_db")]
    UnsortedMcsTable,

    #[error("carrier frequency must be positive, got {0}")]
    InvalidFrequency(f64),
}

pub type Result<T> = std::result::Result<T, RfError>;
