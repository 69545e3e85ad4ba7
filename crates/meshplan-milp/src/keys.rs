//! Small fixed-shape variable keys, replacing tuple-keyed dictionaries with
//! named, stably-hashed structs so every MILP variable dictionary reads the
//! same way regardless of stage.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub tx: String,
    pub rx: String,
}

impl LinkKey {
    pub fn new(tx: impl Into<String>, rx: impl Into<String>) -> Self {
        Self { tx: tx.into(), rx: rx.into() }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.tx, self.rx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectorChannelKey {
    pub sector_id: String,
    pub channel: u32,
}

impl SectorChannelKey {
    pub fn new(sector_id: impl Into<String>, channel: u32) -> Self {
        Self { sector_id: sector_id.into(), channel }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkChannelKey {
    pub link: LinkKey,
    pub channel: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub site_id: String,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(site_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self { site_id: site_id.into(), node_id: node_id.into() }
    }
}

/// `(interfering_path, interfered_link, interfering_channel)` — the key for
/// the `tdm_compatible_polarity` linearization variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolarityLinKey {
    pub path: LinkKey,
    pub interfered: LinkKey,
    pub channel: u32,
}

/// `(link, channel, mcs_level)` — which MCS class a link's capacity is
/// drawn from in the interference stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkMcsKey {
    pub link: LinkKey,
    pub channel: u32,
    pub mcs_level: u32,
}
