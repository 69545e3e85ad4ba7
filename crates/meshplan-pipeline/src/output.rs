//! Persisted artifacts: per-stage LP dumps (debug mode only), CSV tables for
//! sites/links/sectors, a YAML metrics summary, and a KML writer (one
//! Placemark per active site). Everything here writes only after the driver
//! completes successfully; partial output is strictly worse than none.

use crate::analyzer::AnalysisReport;
use crate::error::{PipelineError, Result};
use meshplan_core::enums::{LinkType, PolarityType, SiteType, StatusType};
use meshplan_core::topology::Topology;
use meshplan_solver::MipSolver;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

fn io_err(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io { path: path.display().to_string(), source }
}

/// Writes `solver`'s current model to
/// `<output_dir>/debug/<stage_name>_<timestamp>.lp`. Called only when
/// `debug_mode` is on; `timestamp` is the caller's wall-clock reading so
/// repeated runs in the same `output_dir` don't clobber each other's dumps.
pub fn dump_lp(output_dir: &Path, stage_name: &str, timestamp: u64, solver: &dyn MipSolver) -> Result<()> {
    let dir = output_dir.join("debug");
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let path = dir.join(format!("{stage_name}_{timestamp}.lp"));
    solver.write_lp(&path)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SiteRow {
    site_id: String,
    site_type: &'static str,
    status: &'static str,
    polarity: &'static str,
    device_sku: String,
    latitude: f64,
    longitude: f64,
    altitude_m: f64,
    capex: f64,
    utilization: f64,
}

#[derive(Debug, Serialize)]
struct LinkRow {
    link_id: String,
    tx_site_id: String,
    rx_site_id: String,
    link_type: &'static str,
    status: &'static str,
    distance_m: f64,
    capacity_gbps: f64,
    mcs_level: u32,
    sinr_dbm: Option<f64>,
    flow_gbps: f64,
    utilization: f64,
    is_redundant: bool,
}

#[derive(Debug, Serialize)]
struct SectorRow {
    sector_id: String,
    site_id: String,
    node_id: String,
    ant_azimuth_deg: f64,
    status: &'static str,
    channel: Option<u32>,
}

fn site_type_label(t: SiteType) -> &'static str {
    match t {
        SiteType::Cn => "CN",
        SiteType::Dn => "DN",
        SiteType::Pop => "POP",
    }
}

fn status_label(s: StatusType) -> &'static str {
    match s {
        StatusType::Proposed => "PROPOSED",
        StatusType::Existing => "EXISTING",
        StatusType::Candidate => "CANDIDATE",
        StatusType::Unavailable => "UNAVAILABLE",
        StatusType::Unreachable => "UNREACHABLE",
    }
}

fn polarity_label(p: PolarityType) -> &'static str {
    match p {
        PolarityType::Odd => "ODD",
        PolarityType::Even => "EVEN",
        PolarityType::Unassigned => "UNASSIGNED",
    }
}

fn link_type_label(t: LinkType) -> &'static str {
    match t {
        LinkType::WirelessBackhaul => "WIRELESS_BACKHAUL",
        LinkType::WirelessAccess => "WIRELESS_ACCESS",
        LinkType::Ethernet => "ETHERNET",
    }
}

/// Writes `output/site.csv`, `output/link.csv` and `output/sector.csv`.
pub fn write_csv_tables(output_dir: &Path, topology: &Topology, report: &AnalysisReport) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;

    let site_path = output_dir.join("site.csv");
    let mut writer = csv::Writer::from_path(&site_path).map_err(PipelineError::Csv)?;
    for site in topology.sorted_sites() {
        let row = SiteRow {
            site_id: site.site_id.clone(),
            site_type: site_type_label(site.site_type),
            status: status_label(site.status),
            polarity: polarity_label(site.polarity),
            device_sku: site.device.sku.clone(),
            latitude: site.location.latitude,
            longitude: site.location.longitude,
            altitude_m: site.location.altitude_m,
            capex: report.site_capex.get(&site.site_id).copied().unwrap_or(0.0),
            utilization: report.site_utilization.get(&site.site_id).copied().unwrap_or(0.0),
        };
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| io_err(&site_path, e))?;

    let link_path = output_dir.join("link.csv");
    let mut writer = csv::Writer::from_path(&link_path).map_err(PipelineError::Csv)?;
    for link in topology.sorted_links() {
        let row = LinkRow {
            link_id: link.link_id.clone(),
            tx_site_id: link.tx_site_id.clone(),
            rx_site_id: link.rx_site_id.clone(),
            link_type: link_type_label(link.link_type),
            status: status_label(link.status),
            distance_m: link.distance_m,
            capacity_gbps: link.budget.capacity_gbps,
            mcs_level: link.budget.mcs_level,
            sinr_dbm: link.sinr_dbm,
            flow_gbps: report.link_flow.get(&link.link_id).copied().unwrap_or(0.0),
            utilization: report.link_utilization.get(&link.link_id).copied().unwrap_or(0.0),
            is_redundant: link.is_redundant,
        };
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| io_err(&link_path, e))?;

    let sector_path = output_dir.join("sector.csv");
    let mut writer = csv::Writer::from_path(&sector_path).map_err(PipelineError::Csv)?;
    for sector in topology.sorted_sectors() {
        let row = SectorRow {
            sector_id: sector.sector_id.clone(),
            site_id: sector.site_id.clone(),
            node_id: sector.node_id.clone(),
            ant_azimuth_deg: sector.ant_azimuth_deg,
            status: status_label(sector.status),
            channel: sector.channel,
        };
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| io_err(&sector_path, e))?;

    Ok(())
}

/// Writes `output/metrics.yaml`, the aggregate scalars from the analyzer.
pub fn write_metrics_yaml(output_dir: &Path, report: &AnalysisReport) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
    let path = output_dir.join("metrics.yaml");
    let file = fs::File::create(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::to_writer(file, &report.metrics).map_err(PipelineError::Yaml)?;
    Ok(())
}

/// One KML `Placemark` per active site, enough to preview a design in any
/// map viewer; not a full styling/network-link implementation.
pub trait KmlWriter {
    fn write(&self, topology: &Topology, path: &Path) -> Result<()>;
}

pub struct PlacemarkKmlWriter;

impl KmlWriter for PlacemarkKmlWriter {
    fn write(&self, topology: &Topology, path: &Path) -> Result<()> {
        let mut body = String::new();
        body.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        body.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\"><Document>\n");
        for site in topology.sorted_sites() {
            if !site.status.active() {
                continue;
            }
            body.push_str("<Placemark>\n");
            body.push_str(&format!("<name>{}</name>\n", site.site_id));
            body.push_str(&format!("<description>{} {}</description>\n", site_type_label(site.site_type), site.device.sku));
            body.push_str(&format!(
                "<Point><coordinates>{},{},{}</coordinates></Point>\n",
                site.location.longitude, site.location.latitude, site.location.altitude_m
            ));
            body.push_str("</Placemark>\n");
        }
        body.push_str("</Document></kml>\n");
        fs::write(path, body).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

pub fn default_output_paths(output_dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (output_dir.join("site.csv"), output_dir.join("link.csv"), output_dir.join("metrics.yaml"))
}
