//! Shared variables, constraints and helpers used by every stage solver:
//! flow balance, capacity, TDM-per-sector, POP capacity, polarity,
//! co-location, P2MP, CN-incoming, symmetry, node coupling, channel
//! exclusion, cost/coverage objectives, link weighting and loop pruning.
//! Stages are composed from these building blocks as values (free
//! functions plus a shared registry), not via a class hierarchy.

use crate::error::{MilpError, Result};
use crate::keys::{LinkKey, LinkMcsKey, NodeKey, PolarityLinKey, SectorChannelKey};
use crate::params::OptimizerParams;
use crate::setup::{LocationClass, OptimizationSetup};
use meshplan_core::constants::{BACKHAUL_LINK_TYPE_WEIGHT, EPSILON};
use meshplan_core::enums::{LinkType, PolarityType, SiteType, StatusType};
use meshplan_core::Topology;
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense, VarType};
use std::collections::{HashMap, HashSet};

/// Every variable index registered so far, keyed the same way regardless of
/// which stage is building the model.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    pub site: HashMap<String, usize>,
    pub sector: HashMap<SectorChannelKey, usize>,
    pub odd: HashMap<String, usize>,
    pub flow: HashMap<LinkKey, usize>,
    pub tdm: HashMap<(LinkKey, u32), usize>,
    pub shortage: HashMap<String, usize>,
    pub active_link: HashMap<LinkKey, usize>,
    pub link_capacity_var: HashMap<LinkMcsKey, usize>,
    pub tdm_compatible_polarity: HashMap<PolarityLinKey, usize>,
    pub buffer: Option<usize>,
}

/// Carries the handful of constraint indices a stage needs to delete and
/// re-add with a different bound (the coverage-relaxation loop in min-cost).
#[derive(Debug, Default)]
pub struct DeletableConstraints {
    pub coverage: Option<usize>,
    pub budget: Option<usize>,
}

pub struct NetworkOptimization<'a> {
    pub topology: &'a Topology,
    pub setup: &'a OptimizationSetup,
    pub params: &'a OptimizerParams,
    pub vars: VariableRegistry,
    pub deletable: DeletableConstraints,
}

impl<'a> NetworkOptimization<'a> {
    pub fn new(topology: &'a Topology, setup: &'a OptimizationSetup, params: &'a OptimizerParams) -> Self {
        Self { topology, setup, params, vars: VariableRegistry::default(), deletable: DeletableConstraints::default() }
    }

    // ---- variable registration -----------------------------------------

    pub fn ensure_site_var(&mut self, solver: &mut dyn MipSolver, site_id: &str) -> usize {
        if let Some(&idx) = self.vars.site.get(site_id) {
            return idx;
        }
        let immutable_active = self.topology.sites.get(site_id).is_some_and(|s| s.status.immutable() && s.status.active());
        let (lb, ub) = if immutable_active { (1.0, 1.0) } else { (0.0, 1.0) };
        let idx = solver.add_variable(&format!("site_{site_id}"), VarType::Binary, lb, ub);
        self.vars.site.insert(site_id.to_string(), idx);
        idx
    }

    pub fn ensure_sector_var(&mut self, solver: &mut dyn MipSolver, sector_id: &str, channel: u32) -> usize {
        let key = SectorChannelKey::new(sector_id, channel);
        if let Some(&idx) = self.vars.sector.get(&key) {
            return idx;
        }
        let idx = solver.add_variable(&format!("sector_{sector_id}_{channel}"), VarType::Binary, 0.0, 1.0);
        self.vars.sector.insert(key, idx);
        idx
    }

    pub fn ensure_odd_var(&mut self, solver: &mut dyn MipSolver, site_id: &str) -> usize {
        if let Some(&idx) = self.vars.odd.get(site_id) {
            return idx;
        }
        let (lb, ub) = match self.topology.sites.get(site_id).map(|s| s.polarity) {
            Some(PolarityType::Odd) => (1.0, 1.0),
            Some(PolarityType::Even) => (0.0, 0.0),
            _ => (0.0, 1.0),
        };
        let idx = solver.add_variable(&format!("odd_{site_id}"), VarType::Binary, lb, ub);
        self.vars.odd.insert(site_id.to_string(), idx);
        idx
    }

    pub fn ensure_flow_var(&mut self, solver: &mut dyn MipSolver, link: &LinkKey) -> usize {
        if let Some(&idx) = self.vars.flow.get(link) {
            return idx;
        }
        let cap = self.setup.link_capacities.get(link).copied().unwrap_or(0.0).min(1e6);
        let idx = solver.add_variable(&format!("flow_{link}"), VarType::Continuous, 0.0, cap);
        self.vars.flow.insert(link.clone(), idx);
        idx
    }

    pub fn ensure_tdm_var(&mut self, solver: &mut dyn MipSolver, link: &LinkKey, channel: u32) -> usize {
        let key = (link.clone(), channel);
        if let Some(&idx) = self.vars.tdm.get(&key) {
            return idx;
        }
        let idx = solver.add_variable(&format!("tdm_{link}_{channel}"), VarType::Continuous, 0.0, 1.0);
        self.vars.tdm.insert(key, idx);
        idx
    }

    pub fn ensure_shortage_var(&mut self, solver: &mut dyn MipSolver, demand_id: &str, demand_gbps: f64) -> usize {
        if let Some(&idx) = self.vars.shortage.get(demand_id) {
            return idx;
        }
        let idx = solver.add_variable(&format!("shortage_{demand_id}"), VarType::Continuous, 0.0, demand_gbps.max(0.0));
        self.vars.shortage.insert(demand_id.to_string(), idx);
        idx
    }

    pub fn ensure_active_link_var(&mut self, solver: &mut dyn MipSolver, link: &LinkKey) -> usize {
        if let Some(&idx) = self.vars.active_link.get(link) {
            return idx;
        }
        let idx = solver.add_variable(&format!("active_{link}"), VarType::Binary, 0.0, 1.0);
        self.vars.active_link.insert(link.clone(), idx);
        idx
    }

    /// Selector for whether wireless `link` is carried on `channel` at MCS
    /// class `mcs_level`; the min-interference stage ties exactly one of
    /// these (across all channels and classes) to the link's activity.
    pub fn ensure_link_capacity_var(&mut self, solver: &mut dyn MipSolver, link: &LinkKey, channel: u32, mcs_level: u32) -> usize {
        let key = LinkMcsKey { link: link.clone(), channel, mcs_level };
        if let Some(&idx) = self.vars.link_capacity_var.get(&key) {
            return idx;
        }
        let idx = solver.add_variable(&format!("mcs_{link}_{channel}_{mcs_level}"), VarType::Binary, 0.0, 1.0);
        self.vars.link_capacity_var.insert(key, idx);
        idx
    }

    /// Linearizes `tdm(path, channel) * [odd(path.tx) == odd(interfered.tx)]`
    /// with the standard four-inequality AND construction. `interfered`'s own
    /// tx and rx always carry opposite polarity once it is active (constraint
    /// 5), so "same polarity as the victim's tx" is equivalent to "opposite
    /// the victim's rx" — the condition under which `path`'s transmitter and
    /// `interfered`'s receiver are awake in the same TDM half, and `path`'s
    /// interference actually lands on `interfered`. Adds the defining
    /// constraints at creation time since the variable is meaningless without
    /// them.
    pub fn ensure_tdm_compatible_polarity_var(
        &mut self,
        solver: &mut dyn MipSolver,
        path: &LinkKey,
        interfered: &LinkKey,
        channel: u32,
    ) -> usize {
        let key = PolarityLinKey { path: path.clone(), interfered: interfered.clone(), channel };
        if let Some(&idx) = self.vars.tdm_compatible_polarity.get(&key) {
            return idx;
        }
        let idx = solver.add_variable(&format!("tdm_poly_{path}_{interfered}_{channel}"), VarType::Continuous, 0.0, 1.0);
        self.vars.tdm_compatible_polarity.insert(key, idx);

        let tdm_idx = self.ensure_tdm_var(solver, path, channel);
        let odd_i = self.ensure_odd_var(solver, &interfered.tx);
        let odd_k = self.ensure_odd_var(solver, &path.tx);

        let mut upper_plus = LinearExpr::new();
        upper_plus.add_term(idx, 1.0);
        upper_plus.add_term(odd_i, -1.0);
        upper_plus.add_term(odd_k, 1.0);
        solver.add_constraint(None, upper_plus, ConstraintSense::Le, 1.0);

        let mut upper_minus = LinearExpr::new();
        upper_minus.add_term(idx, 1.0);
        upper_minus.add_term(odd_i, 1.0);
        upper_minus.add_term(odd_k, -1.0);
        solver.add_constraint(None, upper_minus, ConstraintSense::Le, 1.0);

        let mut upper_tdm = LinearExpr::new();
        upper_tdm.add_term(idx, 1.0);
        upper_tdm.add_term(tdm_idx, -1.0);
        solver.add_constraint(None, upper_tdm, ConstraintSense::Le, 0.0);

        let mut lower_same = LinearExpr::new();
        lower_same.add_term(idx, 1.0);
        lower_same.add_term(tdm_idx, -1.0);
        lower_same.add_term(odd_i, -1.0);
        lower_same.add_term(odd_k, -1.0);
        solver.add_constraint(None, lower_same, ConstraintSense::Ge, -2.0);

        let mut lower_diff = LinearExpr::new();
        lower_diff.add_term(idx, 1.0);
        lower_diff.add_term(tdm_idx, -1.0);
        lower_diff.add_term(odd_i, 1.0);
        lower_diff.add_term(odd_k, 1.0);
        solver.add_constraint(None, lower_diff, ConstraintSense::Ge, 0.0);

        idx
    }

    pub fn ensure_buffer_var(&mut self, solver: &mut dyn MipSolver) -> usize {
        if let Some(idx) = self.vars.buffer {
            return idx;
        }
        let idx = solver.add_variable("buffer", VarType::Continuous, 0.0, 1e6);
        self.vars.buffer = Some(idx);
        idx
    }

    // ---- common constraints ---------------------------------------------

    /// Constraint 1: flow balance at every real site, the supersource and
    /// every expanded demand point.
    pub fn add_flow_balance_constraints(&mut self, solver: &mut dyn MipSolver) {
        use meshplan_core::constants::SUPERSOURCE;

        for site_id in self.setup.real_sites(self.topology) {
            let incoming: Vec<LinkKey> = self
                .topology
                .predecessors(site_id)
                .into_iter()
                .map(|p| LinkKey::new(p, site_id))
                .chain(std::iter::once(LinkKey::new(SUPERSOURCE, site_id)).filter(|_| {
                    self.topology.sites.get(site_id).is_some_and(|s| s.site_type == SiteType::Pop)
                }))
                .collect();
            let outgoing: Vec<LinkKey> = self.topology.successors(site_id).into_iter().map(|s| LinkKey::new(site_id, s)).collect();

            let mut expr = LinearExpr::new();
            for link in &incoming {
                let idx = self.ensure_flow_var(solver, link);
                expr.add_term(idx, 1.0);
            }
            for link in &outgoing {
                let idx = self.ensure_flow_var(solver, link);
                expr.add_term(idx, -1.0);
            }
            solver.add_constraint(Some(&format!("balance_{site_id}")), expr, ConstraintSense::Eq, 0.0);
        }

        for (demand_id, sites) in &self.setup.demand_connected_sites {
            let demand_gbps = self.setup.demand_at_location.get(demand_id).copied().unwrap_or(0.0);
            let shortage_idx = self.ensure_shortage_var(solver, demand_id, demand_gbps);
            let mut expr = LinearExpr::new();
            for site_id in sites {
                let link = LinkKey::new(site_id.clone(), demand_id.clone());
                let idx = self.ensure_flow_var(solver, &link);
                expr.add_term(idx, 1.0);
            }
            if self.params.maximize_common_bandwidth {
                let buffer_idx = self.ensure_buffer_var(solver);
                expr.add_term(buffer_idx, -1.0);
                solver.add_constraint(Some(&format!("demand_buffer_{demand_id}")), expr, ConstraintSense::Eq, 0.0);
            } else {
                expr.add_term(shortage_idx, 1.0);
                solver.add_constraint(Some(&format!("demand_{demand_id}")), expr, ConstraintSense::Eq, demand_gbps);
            }
        }
    }

    /// Constraint 2: `flow <= capacity * sum_c tdm` for wireless links; wired
    /// and imaginary links get a plain capacity cap.
    pub fn add_capacity_constraints(&mut self, solver: &mut dyn MipSolver) {
        let channels: Vec<u32> = (0..self.params.number_of_channels.max(1)).collect();
        for link in self.topology.sorted_links() {
            let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
            let cap = self.setup.link_capacities.get(&key).copied().unwrap_or(0.0);
            let flow_idx = self.ensure_flow_var(solver, &key);

            if self.setup.wired_links.contains(&key) || !link.link_type.is_wireless() {
                let mut expr = LinearExpr::new();
                expr.add_term(flow_idx, 1.0);
                solver.add_constraint(None, expr, ConstraintSense::Le, cap.min(1e6));
                continue;
            }

            let mut expr = LinearExpr::new();
            expr.add_term(flow_idx, 1.0);
            for &c in &channels {
                let tdm_idx = self.ensure_tdm_var(solver, &key, c);
                expr.add_term(tdm_idx, -cap);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 0.0);
        }
    }

    /// Constraint 3: a sector self-limits its duty cycle; the sector must be
    /// active before any link through it can carry flow.
    pub fn add_tdm_per_sector_constraints(&mut self, solver: &mut dyn MipSolver) {
        let channels: Vec<u32> = (0..self.params.number_of_channels.max(1)).collect();
        for site in self.topology.sorted_sites() {
            for sector in self.topology.sectors_of_site(&site.site_id) {
                for &c in &channels {
                    let sector_idx = self.ensure_sector_var(solver, &sector.sector_id, c);

                    let mut out_expr = LinearExpr::new();
                    for rx in self.topology.successors(&site.site_id) {
                        if let Some(link) = self.topology.get_link_by_site_ids(&site.site_id, rx) {
                            if link.tx_sector_id.as_deref() == Some(&sector.sector_id) {
                                let key = LinkKey::new(site.site_id.clone(), rx.to_string());
                                let tdm_idx = self.ensure_tdm_var(solver, &key, c);
                                out_expr.add_term(tdm_idx, 1.0);
                            }
                        }
                    }
                    out_expr.add_term(sector_idx, -1.0);
                    solver.add_constraint(None, out_expr, ConstraintSense::Le, 0.0);

                    let mut in_expr = LinearExpr::new();
                    for tx in self.topology.predecessors(&site.site_id) {
                        if let Some(link) = self.topology.get_link_by_site_ids(tx, &site.site_id) {
                            if link.rx_sector_id.as_deref() == Some(&sector.sector_id) {
                                let key = LinkKey::new(tx.to_string(), site.site_id.clone());
                                let tdm_idx = self.ensure_tdm_var(solver, &key, c);
                                in_expr.add_term(tdm_idx, 1.0);
                            }
                        }
                    }
                    in_expr.add_term(sector_idx, -1.0);
                    solver.add_constraint(None, in_expr, ConstraintSense::Le, 0.0);
                }
            }
        }
    }

    /// Constraint 4: outgoing POP flow bounded by the configured capacity.
    pub fn add_pop_capacity_constraints(&mut self, solver: &mut dyn MipSolver) {
        use meshplan_core::constants::SUPERSOURCE;
        for site in self.topology.sorted_sites() {
            if site.site_type != SiteType::Pop {
                continue;
            }
            let mut expr = LinearExpr::new();
            let link = LinkKey::new(SUPERSOURCE, site.site_id.clone());
            let idx = self.ensure_flow_var(solver, &link);
            expr.add_term(idx, 1.0);
            solver.add_constraint(Some(&format!("pop_cap_{}", site.site_id)), expr, ConstraintSense::Le, self.params.pop_capacity_gbps);
        }
    }

    /// Constraint 5: polarity compatibility on DN/POP links, with forced
    /// links pinned to strict opposite polarity.
    pub fn add_polarity_constraints(&mut self, solver: &mut dyn MipSolver) {
        if self.params.ignore_polarities {
            return;
        }
        let channels: Vec<u32> = (0..self.params.number_of_channels.max(1)).collect();
        for link in self.topology.sorted_links() {
            if !link.link_type.is_wireless() {
                continue;
            }
            let Some(tx) = self.topology.sites.get(&link.tx_site_id) else { continue };
            let Some(rx) = self.topology.sites.get(&link.rx_site_id) else { continue };
            if !SiteType::dist_site_types().contains(&tx.site_type) || !SiteType::dist_site_types().contains(&rx.site_type) {
                continue;
            }

            let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
            let odd_i = self.ensure_odd_var(solver, &link.tx_site_id);
            let odd_j = self.ensure_odd_var(solver, &link.rx_site_id);
            let forced = tx.status.immutable() && rx.status.immutable() && tx.status.active() && rx.status.active();

            if forced {
                let mut expr = LinearExpr::new();
                expr.add_term(odd_i, 1.0);
                expr.add_term(odd_j, 1.0);
                solver.add_constraint(None, expr, ConstraintSense::Eq, 1.0);
                continue;
            }

            for &c in &channels {
                let tdm_idx = self.ensure_tdm_var(solver, &key, c);
                let mut upper = LinearExpr::new();
                upper.add_term(tdm_idx, 1.0);
                upper.add_term(odd_i, -1.0);
                upper.add_term(odd_j, -1.0);
                solver.add_constraint(None, upper, ConstraintSense::Le, 0.0);

                let mut lower = LinearExpr::new();
                lower.add_term(tdm_idx, 1.0);
                lower.add_term(odd_i, 1.0);
                lower.add_term(odd_j, 1.0);
                solver.add_constraint(None, lower, ConstraintSense::Le, 2.0);
            }
        }
    }

    /// Constraint 6: at most one active site per co-location group; a forced
    /// member of the group pins which one (up-typing CN -> DN -> POP, or a
    /// same-type replacement, are the only allowed substitutes).
    pub fn add_colocation_constraints(&mut self, solver: &mut dyn MipSolver) {
        fn type_rank(t: SiteType) -> u8 {
            match t {
                SiteType::Cn => 0,
                SiteType::Dn => 1,
                SiteType::Pop => 2,
            }
        }

        for group in self.topology.colocation_groups() {
            let mut expr = LinearExpr::new();
            for site_id in &group {
                let idx = self.ensure_site_var(solver, site_id);
                expr.add_term(idx, 1.0);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 1.0);

            let forced: Vec<&String> = group
                .iter()
                .filter(|id| self.topology.sites.get(id.as_str()).is_some_and(|s| s.status.immutable() && s.status.active()))
                .collect();
            if let Some(&forced_id) = forced.first() {
                let forced_rank = self.topology.sites[forced_id].site_type;
                for site_id in &group {
                    if site_id == forced_id {
                        continue;
                    }
                    let rank = self.topology.sites[site_id].site_type;
                    if type_rank(rank) < type_rank(forced_rank) {
                        let idx = self.ensure_site_var(solver, site_id);
                        let mut pin = LinearExpr::new();
                        pin.add_term(idx, 1.0);
                        solver.add_constraint(None, pin, ConstraintSense::Eq, 0.0);
                    }
                }
            }
        }
    }

    /// Constraint 7: per-DN-sector outgoing link limits.
    pub fn add_p2mp_constraints(&mut self, solver: &mut dyn MipSolver) {
        for site in self.topology.sorted_sites() {
            if site.site_type != SiteType::Dn {
                continue;
            }
            for sector in self.topology.sectors_of_site(&site.site_id) {
                let outgoing: Vec<&meshplan_core::Link> = self
                    .topology
                    .successors(&site.site_id)
                    .into_iter()
                    .filter_map(|rx| self.topology.get_link_by_site_ids(&site.site_id, rx))
                    .filter(|l| l.tx_sector_id.as_deref() == Some(&sector.sector_id))
                    .collect();

                let dn_dn: Vec<&meshplan_core::Link> = outgoing
                    .iter()
                    .filter(|l| self.topology.sites.get(&l.rx_site_id).is_some_and(|s| s.site_type == SiteType::Dn))
                    .copied()
                    .collect();

                if !dn_dn.is_empty() {
                    let mut expr = LinearExpr::new();
                    for l in &dn_dn {
                        let key = LinkKey::new(l.tx_site_id.clone(), l.rx_site_id.clone());
                        let idx = self.ensure_active_link_var(solver, &key);
                        expr.add_term(idx, 1.0);
                    }
                    solver.add_constraint(None, expr, ConstraintSense::Le, self.params.dn_dn_sector_limit as f64);
                }

                if !outgoing.is_empty() {
                    let mut expr = LinearExpr::new();
                    for l in &outgoing {
                        let key = LinkKey::new(l.tx_site_id.clone(), l.rx_site_id.clone());
                        let idx = self.ensure_active_link_var(solver, &key);
                        expr.add_term(idx, 1.0);
                    }
                    solver.add_constraint(None, expr, ConstraintSense::Le, self.params.dn_total_sector_limit as f64);
                }
            }
        }
    }

    /// Constraint 8: a CN has at most one active incoming link.
    pub fn add_cn_incoming_constraints(&mut self, solver: &mut dyn MipSolver) {
        for site in self.topology.sorted_sites() {
            if site.site_type != SiteType::Cn {
                continue;
            }
            let incoming: Vec<LinkKey> = self
                .topology
                .predecessors(&site.site_id)
                .into_iter()
                .map(|tx| LinkKey::new(tx, site.site_id.clone()))
                .collect();
            if incoming.is_empty() {
                continue;
            }
            let mut expr = LinearExpr::new();
            for key in &incoming {
                let idx = self.ensure_active_link_var(solver, key);
                expr.add_term(idx, 1.0);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 1.0);
        }
    }

    /// Constraint 9: bidirectional wireless links select symmetrically.
    pub fn add_symmetry_constraints(&mut self, solver: &mut dyn MipSolver) {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for link in self.topology.sorted_links() {
            if !link.link_type.is_wireless() {
                continue;
            }
            let pair = if link.tx_site_id <= link.rx_site_id {
                (link.tx_site_id.clone(), link.rx_site_id.clone())
            } else {
                (link.rx_site_id.clone(), link.tx_site_id.clone())
            };
            if !seen.insert(pair) {
                continue;
            }
            let Some(reverse) = self.topology.get_link_by_site_ids(&link.rx_site_id, &link.tx_site_id) else { continue };
            let fwd_key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
            let rev_key = LinkKey::new(reverse.tx_site_id.clone(), reverse.rx_site_id.clone());
            let fwd_idx = self.ensure_active_link_var(solver, &fwd_key);
            let rev_idx = self.ensure_active_link_var(solver, &rev_key);

            let mut expr = LinearExpr::new();
            expr.add_term(fwd_idx, 1.0);
            expr.add_term(rev_idx, -1.0);
            solver.add_constraint(None, expr, ConstraintSense::Eq, 0.0);
        }
    }

    /// Constraint 10: all sectors sharing a node activate together, on every
    /// channel — otherwise two sectors on the same node could each select a
    /// different channel without tripping the equality.
    pub fn add_node_coupling_constraints(&mut self, solver: &mut dyn MipSolver) {
        let channels: Vec<u32> = (0..self.params.number_of_channels.max(1)).collect();
        let mut by_node: HashMap<NodeKey, Vec<String>> = HashMap::new();
        for sector in self.topology.sorted_sectors() {
            by_node.entry(NodeKey::new(sector.site_id.clone(), sector.node_id.clone())).or_default().push(sector.sector_id.clone());
        }
        for (node, sectors) in by_node {
            if sectors.len() < 2 {
                continue;
            }
            for &c in &channels {
                let first = self.ensure_sector_var(solver, &sectors[0], c);
                for other in &sectors[1..] {
                    let idx = self.ensure_sector_var(solver, other, c);
                    let mut expr = LinearExpr::new();
                    expr.add_term(first, 1.0);
                    expr.add_term(idx, -1.0);
                    solver.add_constraint(None, expr, ConstraintSense::Eq, 0.0);
                }
            }
            let _ = node;
        }
    }

    /// Constraint 11: a DN sector uses at most one channel; a link is active
    /// on a channel only if both endpoint sectors are (a CN rx inherits its
    /// serving DN's channel so is exempt). Skipped entirely when
    /// `number_of_channels == 1`, per the boundary behaviour that a single
    /// channel disables all channel-equality machinery.
    pub fn add_channel_exclusion_constraints(&mut self, solver: &mut dyn MipSolver) {
        if self.params.number_of_channels <= 1 {
            return;
        }
        let channels: Vec<u32> = (0..self.params.number_of_channels).collect();

        for sector in self.topology.sorted_sectors() {
            if sector.sector_type == meshplan_core::enums::SectorType::Cn {
                continue;
            }
            let mut expr = LinearExpr::new();
            for &c in &channels {
                let idx = self.ensure_sector_var(solver, &sector.sector_id, c);
                expr.add_term(idx, 1.0);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 1.0);
        }

        for link in self.topology.sorted_links() {
            if !link.link_type.is_wireless() {
                continue;
            }
            let (Some(tx_sec), Some(rx_sec)) = (&link.tx_sector_id, &link.rx_sector_id) else { continue };
            let rx_is_cn = self.topology.sites.get(&link.rx_site_id).is_some_and(|s| s.site_type == SiteType::Cn);
            if rx_is_cn {
                continue;
            }
            let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
            for &c in &channels {
                let active_idx = self.ensure_active_link_var(solver, &key);
                let tx_idx = self.ensure_sector_var(solver, tx_sec, c);
                let rx_idx = self.ensure_sector_var(solver, rx_sec, c);

                let mut upper = LinearExpr::new();
                upper.add_term(active_idx, 1.0);
                upper.add_term(tx_idx, -1.0);
                upper.add_term(rx_idx, 1.0);
                solver.add_constraint(None, upper, ConstraintSense::Le, 1.0);

                let mut lower = LinearExpr::new();
                lower.add_term(active_idx, 1.0);
                lower.add_term(rx_idx, -1.0);
                lower.add_term(tx_idx, 1.0);
                solver.add_constraint(None, lower, ConstraintSense::Le, 1.0);
            }
        }
    }

    // ---- cost / coverage / weights --------------------------------------

    /// `cost = sum(site_capex * site[i]) + sum(sector_capex * node-coupled sector[i])`,
    /// node capex charged once per node.
    pub fn cost_expression(&mut self, solver: &mut dyn MipSolver) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for site in self.topology.sorted_sites() {
            if site.status.immutable() {
                continue;
            }
            let capex = self.setup.cost_site.get(&site.site_id).copied().unwrap_or(0.0);
            if capex == 0.0 {
                continue;
            }
            let idx = self.ensure_site_var(solver, &site.site_id);
            expr.add_term(idx, capex);
        }

        let mut seen_nodes: HashSet<NodeKey> = HashSet::new();
        for sector in self.topology.sorted_sectors() {
            let node_key = NodeKey::new(sector.site_id.clone(), sector.node_id.clone());
            if !seen_nodes.insert(node_key.clone()) {
                continue;
            }
            let capex = self.setup.cost_sector.get(&node_key).copied().unwrap_or(0.0);
            if capex == 0.0 {
                continue;
            }
            let idx = self.ensure_sector_var(solver, &sector.sector_id, 0);
            expr.add_term(idx, capex);
        }
        expr
    }

    pub fn add_budget_constraint(&mut self, solver: &mut dyn MipSolver, budget: f64) {
        let cost_expr = self.cost_expression(solver);
        let idx = solver.add_constraint(Some("budget"), cost_expr, ConstraintSense::Le, budget);
        self.deletable.budget = Some(idx);
    }

    /// Sum-of-shortage coverage objective expression (`sum shortage[d]`).
    pub fn shortage_sum_expression(&mut self, solver: &mut dyn MipSolver) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for demand_id in self.setup.demand_connected_sites.keys().cloned().collect::<Vec<_>>() {
            let demand_gbps = self.setup.demand_at_location.get(&demand_id).copied().unwrap_or(0.0);
            let idx = self.ensure_shortage_var(solver, &demand_id, demand_gbps);
            expr.add_term(idx, 1.0);
        }
        expr
    }

    /// Adds `coverage >= floor * total_demand` as a separable, deletable
    /// constraint so the auto-relaxation loop can delete and re-add it with
    /// a lower floor without rebuilding the whole model.
    pub fn add_coverage_constraint(&mut self, solver: &mut dyn MipSolver, coverage_floor: f64) {
        let total_demand: f64 = self.setup.demand_at_location.values().sum();
        let shortage_expr = self.shortage_sum_expression(solver);
        let max_shortage = total_demand * (1.0 - coverage_floor);
        let idx = solver.add_constraint(Some("coverage"), shortage_expr, ConstraintSense::Le, max_shortage);
        self.deletable.coverage = Some(idx);
    }

    pub fn replace_coverage_constraint(&mut self, solver: &mut dyn MipSolver, coverage_floor: f64) -> Result<()> {
        if let Some(idx) = self.deletable.coverage.take() {
            solver.del_constraint(idx)?;
        }
        self.add_coverage_constraint(solver, coverage_floor);
        Ok(())
    }

    /// `w = 1 + (max_distance - distance) / max_distance`; wired/imaginary
    /// links get a uniform weight of 1. Backhaul links are further scaled by
    /// `BACKHAUL_LINK_TYPE_WEIGHT` to bias the interference objective toward
    /// keeping access links over long backhaul hops when both are viable.
    pub fn link_weight(&self, link: &meshplan_core::Link, max_distance: f64) -> f64 {
        if !link.link_type.is_wireless() {
            return 1.0;
        }
        let max_distance = max_distance.max(1.0);
        let base = 1.0 + (max_distance - link.distance_m) / max_distance;
        if link.link_type == LinkType::WirelessBackhaul {
            base * BACKHAUL_LINK_TYPE_WEIGHT
        } else {
            base
        }
    }

    pub fn max_link_distance(&self) -> f64 {
        self.topology.sorted_links().into_iter().map(|l| l.distance_m).fold(0.0_f64, f64::max)
    }
}

/// Removes slack flow on cycles from a raw flow solution. Whenever the DFS
/// finds a back-edge into an ancestor, it subtracts `min_flow_in_cycle` from
/// every edge along the cycle and restarts at the same node until the
/// back-edge is either zero or no longer completes a cycle.
pub fn prune_flow_loops(flows: &mut HashMap<LinkKey, f64>, adjacency: &HashMap<String, Vec<String>>) {
    loop {
        let mut path: Vec<String> = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        let mut found_cycle = false;

        let roots: Vec<String> = adjacency.keys().cloned().collect();
        for root in roots {
            if found_cycle {
                break;
            }
            if dfs_find_and_break_cycle(&root, flows, adjacency, &mut path, &mut on_path) {
                found_cycle = true;
            }
        }

        if !found_cycle {
            break;
        }
    }
}

fn dfs_find_and_break_cycle(
    node: &str,
    flows: &mut HashMap<LinkKey, f64>,
    adjacency: &HashMap<String, Vec<String>>,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
) -> bool {
    if on_path.contains(node) {
        let cycle_start = path.iter().position(|n| n == node).unwrap_or(0);
        let cycle: Vec<&str> = path[cycle_start..].iter().map(String::as_str).collect();
        let min_flow = cycle
            .windows(2)
            .map(|w| flows.get(&LinkKey::new(w[0], w[1])).copied().unwrap_or(0.0))
            .fold(f64::MAX, f64::min);
        if min_flow > EPSILON {
            for w in cycle.windows(2) {
                let key = LinkKey::new(w[0], w[1]);
                if let Some(f) = flows.get_mut(&key) {
                    *f -= min_flow;
                }
            }
            return true;
        }
        return false;
    }

    path.push(node.to_string());
    on_path.insert(node.to_string());

    let mut broke = false;
    if let Some(next_nodes) = adjacency.get(node) {
        for next in next_nodes.clone() {
            let carries_flow = flows.get(&LinkKey::new(node, next.as_str())).copied().unwrap_or(0.0) > EPSILON;
            if !carries_flow {
                continue;
            }
            if dfs_find_and_break_cycle(&next, flows, adjacency, path, on_path) {
                broke = true;
                break;
            }
        }
    }

    path.pop();
    on_path.remove(node);
    broke
}

pub fn check_solve_ok(solver: &dyn MipSolver, stage: &str) -> Result<()> {
    use meshplan_solver::status;
    let mip_status = solver.mip_status()?;
    let lp_status = solver.lp_status()?;
    if status::mip_search_incomplete(mip_status) && solver.mip_solution_count() == 0 {
        return Err(MilpError::SolverTimedOut { stage: stage.to_string(), mip_status, lp_status });
    }
    if mip_status == status::MIP_INFEASIBLE || status::lp_no_usable_solution(lp_status) && solver.mip_solution_count() == 0 {
        return Err(MilpError::Infeasible { stage: stage.to_string() });
    }
    Ok(())
}

/// Common read-back of decision variables after a stage solve: which sites,
/// sectors and links ended up selected, plus their flows and shortages. Every
/// stage solver builds one of these from its own `NetworkOptimization` at the
/// end of `solve`.
#[derive(Debug, Clone, Default)]
pub struct StageSolution {
    pub selected_sites: HashSet<String>,
    pub selected_sectors: HashSet<(String, u32)>,
    pub active_links: HashSet<LinkKey>,
    pub flows: HashMap<LinkKey, f64>,
    pub shortages: HashMap<String, f64>,
    pub objective_value: f64,
    pub timed_out: bool,
    /// Per-link SINR (dB) computed by the min-interference stage; empty for
    /// every other stage's solution.
    pub link_sinr: HashMap<LinkKey, f64>,
}

pub fn extract_stage_solution(opt: &NetworkOptimization, solver: &dyn MipSolver) -> Result<StageSolution> {
    use meshplan_solver::status;

    let mut selected_sites = HashSet::new();
    for (site_id, &idx) in &opt.vars.site {
        if solver.value_of(idx)? > 0.5 {
            selected_sites.insert(site_id.clone());
        }
    }
    let mut selected_sectors = HashSet::new();
    for (key, &idx) in &opt.vars.sector {
        if solver.value_of(idx)? > 0.5 {
            selected_sectors.insert((key.sector_id.clone(), key.channel));
        }
    }
    let mut active_links = HashSet::new();
    for (key, &idx) in &opt.vars.active_link {
        if solver.value_of(idx)? > 0.5 {
            active_links.insert(key.clone());
        }
    }
    let mut flows = HashMap::new();
    for (key, &idx) in &opt.vars.flow {
        flows.insert(key.clone(), solver.value_of(idx)?);
    }
    let mut shortages = HashMap::new();
    for (demand_id, &idx) in &opt.vars.shortage {
        shortages.insert(demand_id.clone(), solver.value_of(idx)?);
    }
    let objective_value = solver.objective_value().unwrap_or(0.0);
    let timed_out = status::mip_search_incomplete(solver.mip_status()?);

    Ok(StageSolution {
        selected_sites,
        selected_sectors,
        active_links,
        flows,
        shortages,
        objective_value,
        timed_out,
        link_sinr: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StageBudgets;
    use meshplan_core::enums::{LocationType, RedundancyLevel, SectorType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::sector::Sector;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_solver::GoodLpSolver;

    fn params() -> OptimizerParams {
        OptimizerParams {
            site_capex: HashMap::new(),
            budget: 1e9,
            pop_capacity_gbps: 10.0,
            oversubscription: 1.0,
            default_demand_gbps: 0.1,
            dn_dn_sector_limit: 4,
            dn_total_sector_limit: 8,
            maximum_number_hops: 10,
            diff_sector_angle_limit_deg: 10.0,
            near_far_angle_limit_deg: 10.0,
            near_far_length_ratio: 3.0,
            number_of_channels: 2,
            maximize_common_bandwidth: false,
            always_active_pops: false,
            enable_legacy_redundancy_method: false,
            redundancy_level: RedundancyLevel::None,
            backhaul_link_redundancy_ratio: 0.0,
            num_threads: 1,
            stage_budgets: StageBudgets::default(),
            topology_routing: meshplan_core::enums::TopologyRouting::ShortestPath,
            availability_sim_time: 1000.0,
            availability_seed: 42,
            availability_max_time_seconds: 5.0,
            number_of_extra_pops: 0,
            ignore_polarities: true,
        }
    }

    fn pin(solver: &mut dyn MipSolver, idx: usize, value: f64) {
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, value);
    }

    /// `tdm_compatible_polarity` must equal `tdm` when the victim's own tx
    /// and the interferer's own tx share a polarity, and collapse to zero
    /// otherwise — the bilinear `tdm * [odd_i == odd_k]` term the SINR
    /// constraint is built from.
    #[test]
    fn tdm_compatible_polarity_matches_same_polarity_and_zeroes_on_opposite() {
        let topology = Topology::new();
        let params = params();
        let setup = OptimizationSetup::build(&topology, &params).unwrap();

        for (odd_i_val, odd_k_val, expected) in [(1.0, 1.0, 1.0), (0.0, 0.0, 1.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)] {
            let mut opt = NetworkOptimization::new(&topology, &setup, &params);
            let mut solver = GoodLpSolver::new();
            let path = LinkKey::new("path_tx", "path_rx");
            let interfered = LinkKey::new("victim_tx", "victim_rx");

            let idx = opt.ensure_tdm_compatible_polarity_var(&mut solver, &path, &interfered, 0);
            let tdm_idx = opt.ensure_tdm_var(&mut solver, &path, 0);
            let odd_i = opt.ensure_odd_var(&mut solver, &interfered.tx);
            let odd_k = opt.ensure_odd_var(&mut solver, &path.tx);

            pin(&mut solver, tdm_idx, 1.0);
            pin(&mut solver, odd_i, odd_i_val);
            pin(&mut solver, odd_k, odd_k_val);

            let mut objective = LinearExpr::new();
            objective.add_term(idx, 1.0);
            solver.set_objective(objective, ObjectiveSense::Maximize);
            solver.solve(0.0, 1.0, 1).unwrap();

            assert!((solver.value_of(idx).unwrap() - expected).abs() < EPSILON, "odd_i={odd_i_val}, odd_k={odd_k_val}");
        }
    }

    /// A channel a candidate interferer isn't using must not count against the
    /// victim: with `tdm(path, other_channel)` pinned to zero, the same
    /// `odd_i == odd_k` pinning that forced `idx == 1` on the used channel
    /// must force `idx == 0` on the unused one.
    #[test]
    fn tdm_compatible_polarity_is_zero_on_a_channel_the_interferer_does_not_use() {
        let topology = Topology::new();
        let params = params();
        let setup = OptimizationSetup::build(&topology, &params).unwrap();
        let mut opt = NetworkOptimization::new(&topology, &setup, &params);
        let mut solver = GoodLpSolver::new();
        let path = LinkKey::new("path_tx", "path_rx");
        let interfered = LinkKey::new("victim_tx", "victim_rx");

        let used_idx = opt.ensure_tdm_compatible_polarity_var(&mut solver, &path, &interfered, 0);
        let unused_idx = opt.ensure_tdm_compatible_polarity_var(&mut solver, &path, &interfered, 1);
        let tdm_used = opt.ensure_tdm_var(&mut solver, &path, 0);
        let tdm_unused = opt.ensure_tdm_var(&mut solver, &path, 1);
        let odd_i = opt.ensure_odd_var(&mut solver, &interfered.tx);
        let odd_k = opt.ensure_odd_var(&mut solver, &path.tx);

        pin(&mut solver, tdm_used, 1.0);
        pin(&mut solver, tdm_unused, 0.0);
        pin(&mut solver, odd_i, 1.0);
        pin(&mut solver, odd_k, 1.0);

        let mut objective = LinearExpr::new();
        objective.add_term(used_idx, 1.0);
        objective.add_term(unused_idx, 1.0);
        solver.set_objective(objective, ObjectiveSense::Maximize);
        solver.solve(0.0, 1.0, 1).unwrap();

        assert!((solver.value_of(used_idx).unwrap() - 1.0).abs() < EPSILON);
        assert!(solver.value_of(unused_idx).unwrap() < EPSILON);
    }

    /// Two sectors on the same node must stay coupled across every channel,
    /// not just channel 0 — selecting sector A on channel 0 while sector B on
    /// the same node is only ever selected on channel 1 would otherwise
    /// satisfy the old single-channel equality.
    #[test]
    fn node_coupling_holds_across_every_channel() {
        let mut topology = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 500.0, nodes_per_site: 1 };
        let site = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let site_id = site.site_id.clone();
        topology.add_site(site).unwrap();
        let sec_a = Sector::new(site_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(site_id, "n0", 90, 180.0, SectorType::Dn, StatusType::Candidate);
        topology.add_sector(sec_a).unwrap();
        topology.add_sector(sec_b).unwrap();

        let params = params();
        let setup = OptimizationSetup::build(&topology, &params).unwrap();
        let mut opt = NetworkOptimization::new(&topology, &setup, &params);
        let mut solver = GoodLpSolver::new();
        opt.add_node_coupling_constraints(&mut solver);

        let sectors: Vec<_> = topology.sorted_sectors();
        let (sec_a_id, sec_b_id) = (sectors[0].sector_id.clone(), sectors[1].sector_id.clone());
        let a0 = opt.ensure_sector_var(&mut solver, &sec_a_id, 0);
        let a1 = opt.ensure_sector_var(&mut solver, &sec_a_id, 1);
        let b0 = opt.ensure_sector_var(&mut solver, &sec_b_id, 0);
        let b1 = opt.ensure_sector_var(&mut solver, &sec_b_id, 1);

        // Agrees with the old, channel-0-only coupling (a0 == b0 == 1) but
        // splits on channel 1 (a1 == 1, b1 == 0) — exactly the case the
        // single-channel equality missed.
        pin(&mut solver, a0, 1.0);
        pin(&mut solver, b0, 1.0);
        pin(&mut solver, a1, 1.0);
        pin(&mut solver, b1, 0.0);

        let mut objective = LinearExpr::new();
        objective.add_term(a0, 1.0);
        solver.set_objective(objective, ObjectiveSense::Maximize);
        solver.solve(0.0, 1.0, 1).unwrap();

        assert_eq!(solver.mip_status().unwrap(), meshplan_solver::status::MIP_INFEASIBLE);
    }
}
