use thiserror::Error;

/// Errors raised while mutating or validating a [`crate::topology::Topology`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CoreError {
    #[error("site not found: {0}")]
    SiteNotFound(String),

    #[error("site already exists: {0}")]
    SiteAlreadyExists(String),

    #[error("sector not found: {0}")]
    SectorNotFound(String),

    #[error("sector already exists on site {site_id}: {sector_id}")]
    SectorAlreadyExists { site_id: String, sector_id: String },

    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("cannot mutate status of immutable site {0}")]
    ImmutableSiteStatus(String),

    #[error("link {link_id} has only one sector set; a link must have both sectors or neither")]
    InconsistentLinkSectors { link_id: String },

    #[error("CN site {0} cannot have more than one node")]
    CnMultipleNodes(String),

    #[error("sector {sector_type:?} does not match owning site type {site_type:?} on site {site_id}")]
    SectorTypeMismatch {
        site_id: String,
        sector_type: crate::enums::SectorType,
        site_type: crate::enums::SiteType,
    },

    #[error("total horizontal coverage for site {site_id} exceeds 360 degrees: {total_deg}")]
    CoverageExceeded { site_id: String, total_deg: f64 },

    #[error("rooftop site {0} is missing a building_id")]
    MissingBuildingId(String),

    #[error(
        "forced-active link {tx}-{rx} has inconsistent polarity: {tx} is {tx_polarity:?}, {rx} is {rx_polarity:?}"
    )]
    InconsistentPolarity {
        tx: String,
        rx: String,
        tx_polarity: crate::enums::PolarityType,
        rx_polarity: crate::enums::PolarityType,
    },

    #[error("demand site not found: {0}")]
    DemandSiteNotFound(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
