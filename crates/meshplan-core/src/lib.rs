//! Topology data model for the mesh backhaul network planner: sites, sectors,
//! links and demand points, plus the shared geometry and error types the rest
//! of the optimization pipeline builds on.

#![forbid(unsafe_code)]

pub mod constants;
pub mod demand;
pub mod enums;
pub mod error;
pub mod geo;
pub mod link;
pub mod sector;
pub mod site;
pub mod topology;

pub use demand::DemandSite;
pub use enums::{
    DebugFile, DeviceType, LinkType, LocationType, LoggerLevel, OutputFile, PolarityType,
    RedundancyLevel, SectorType, SiteType, StatusType, TopologyRouting,
};
pub use error::{CoreError, Result};
pub use geo::GeoPoint;
pub use link::{Link, LinkBudget};
pub use sector::Sector;
pub use site::{DeviceSpec, Site};
pub use topology::Topology;
