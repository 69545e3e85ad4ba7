//! Enumerations shared across the topology model and optimization pipeline.
//!
//! Every enum implements `to_string`/`from_str` by variant name (case
//! insensitive) and accepts an integer discriminant, matching the
//! "case-insensitive key matching... enum values accepted by name or by
//! integer" requirement on the configuration surface.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A debug LP dump produced for a given pipeline stage when `debug_mode` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugFile {
    PreparedTopology,
    MinCostTopology,
    MaxCoverageTopology,
    RedundantTopology,
    MinInterferenceTopology,
    OptimizedTopology,
    PopProposalOptimization,
    CostOptimization,
    CoverageOptimization,
    RedundantMinShortageOptimization,
    RedundantMinCostOptimization,
    InterferenceOptimization,
    CommonBufferOptimization,
}

impl fmt::Display for DebugFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One of the two physical device classes a site can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Cn,
    Dn,
}

/// Directed link classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    WirelessBackhaul,
    WirelessAccess,
    Ethernet,
}

impl LinkType {
    pub fn is_wireless(self) -> bool {
        !matches!(self, LinkType::Ethernet)
    }
}

/// Where a site physically sits, used to decide whether `building_id` is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    StreetLevel,
    Rooftop,
    Unknown,
}

/// Logging verbosity, mirroring the standard `logging` level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoggerLevel {
    NotSet,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Persisted output artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFile {
    CandidateTopology,
    ReportingTopology,
    Link,
    Site,
    Sector,
    Metrics,
}

/// TDM two-coloring used to let adjacent DN/POP sites time-share spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolarityType {
    Odd,
    Even,
    Unassigned,
}

/// Requested redundancy tier; maps to a `(pop, dn, sink)` node-capacity triple
/// in the redundancy stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedundancyLevel {
    None,
    Low,
    Medium,
    High,
}

/// Sector radio role, derived from the owning site's `SiteType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectorType {
    Cn,
    Dn,
}

/// Site role in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteType {
    Cn,
    Dn,
    Pop,
}

impl SiteType {
    /// DN and POP sites are the ones that take a polarity and participate in
    /// TDM time-sharing; CNs simply inherit their serving DN's channel/polarity.
    pub fn dist_site_types() -> HashSet<SiteType> {
        [SiteType::Pop, SiteType::Dn].into_iter().collect()
    }
}

/// Lifecycle status of a site, sector or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusType {
    Proposed,
    Existing,
    Candidate,
    Unavailable,
    Unreachable,
}

impl StatusType {
    /// EXISTING and UNAVAILABLE come only from user input and are never
    /// mutated by the optimizer.
    pub fn immutable(self) -> bool {
        matches!(self, StatusType::Existing | StatusType::Unavailable)
    }

    pub fn active(self) -> bool {
        matches!(self, StatusType::Proposed | StatusType::Existing)
    }

    pub fn inactive(self) -> bool {
        matches!(self, StatusType::Unavailable | StatusType::Unreachable)
    }

    /// Statuses that graph reachability searches are allowed to traverse.
    pub fn reachable(self) -> bool {
        matches!(
            self,
            StatusType::Proposed | StatusType::Existing | StatusType::Candidate
        )
    }
}

/// Strategy used by `get_topology_routing_results` to pick demand routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyRouting {
    ShortestPath,
    McsCostPath,
    DpaPath,
}
