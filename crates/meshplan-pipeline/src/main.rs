//! CLI entry point: load configuration, initialize logging, build the RF
//! parameters for the run, load the candidate topology, drive the design
//! pipeline, analyze the result and write it out.

use anyhow::{Context, Result};
use clap::Parser;
use meshplan_pipeline::config::PlannerConfig;
use meshplan_pipeline::{analyzer, driver, logging, output, rf_config, system_state, topology_io};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meshplan", about = "Mesh backhaul network planning pipeline")]
struct Args {
    /// Path to a YAML/JSON/TOML configuration file overlaying the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the candidate topology, as written by `meshplan_core::Topology`'s
    /// `Serialize` impl. Overrides `optimizer_params.candidate_topology_file_path`.
    #[arg(short, long)]
    topology: Option<PathBuf>,

    /// Write per-stage LP model dumps under <output-dir>/debug, regardless
    /// of what `system_params.debug_mode` says.
    #[arg(long)]
    dump_lp: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlannerConfig::load(args.config.as_deref()).context("loading configuration")?;
    logging::init_logging(&config.system_params).context("initializing logging")?;
    system_state::init_system_state(&config.system_params);

    info!("mesh backhaul planning pipeline starting");

    let topology_path = args
        .topology
        .clone()
        .or_else(|| config.optimizer_params.candidate_topology_file_path.clone())
        .context("no candidate topology supplied: pass --topology or set optimizer_params.candidate_topology_file_path")?;
    let mut topology = topology_io::load_topology(&topology_path).with_context(|| format!("loading candidate topology at {}", topology_path.display()))?;
    info!(sites = topology.sites.len(), links = topology.links.len(), demands = topology.demand_sites.len(), "loaded candidate topology");

    let primary_device = config
        .devices
        .iter()
        .find(|d| d.device_type == meshplan_core::enums::DeviceType::Dn)
        .or_else(|| config.devices.first())
        .context("device list is non-empty after validation")?;
    let rf_params = rf_config::build_rf_params(&primary_device.sector_params).context("building RF parameters")?;

    let output_dir = &config.system_params.output_dir;
    let debug_output_dir = (config.system_params.debug_mode || args.dump_lp).then_some(output_dir.as_path());
    let result = driver::run_pipeline(&mut topology, &config.optimizer_params, &rf_params, debug_output_dir)?;

    let report = analyzer::analyze(&result.topology, &config.optimizer_params.to_optimizer_params(), Some(&result.post_design));

    output::write_csv_tables(output_dir, &result.topology, &report).context("writing CSV tables")?;
    output::write_metrics_yaml(output_dir, &report).context("writing metrics.yaml")?;
    output::PlacemarkKmlWriter.write(&result.topology, &output_dir.join("design.kml")).context("writing design.kml")?;

    info!(
        min_cost_objective = result.min_cost_objective,
        interference_objective = result.interference_objective,
        capex = report.metrics.total_capex,
        "pipeline complete"
    );

    Ok(())
}
