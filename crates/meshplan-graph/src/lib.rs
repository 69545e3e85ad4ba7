//! Graph utilities for the mesh backhaul network planner: digraph
//! construction, reachability, failure enumeration, demand routing,
//! disjoint-path classification and availability simulation.
#![forbid(unsafe_code)]

pub mod availability;
pub mod builder;
pub mod delaunay;
pub mod error;
pub mod failures;
pub mod hops;
pub mod maxflow;
pub mod reachability;
pub mod routing;

pub use availability::{compute_availability, AvailabilityResult};
pub use builder::{build_digraph, EdgeAttr, NodeKind, PlannerGraph};
pub use delaunay::{delaunay_edges, within_two_hops};
pub use error::{GraphError, Result};
pub use failures::{find_most_disruptive_links, single_edge_failures, single_site_failures};
pub use hops::hops_from_pop;
pub use maxflow::{max_flow, max_flow_with_edge_usage, split_node_graph, FlowGraph};
pub use reachability::{find_connected_demands, reachable_demands_excluding};
pub use routing::{disjoint_paths, get_topology_routing_results, DisjointClass, RouteResult};
