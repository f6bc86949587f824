//! JSON scenario files: network element tables and full simulation runs.

pub mod network_config;
pub mod simulation_config;

pub use network_config::{LoadNetworkConfig, NetworkConfig};
pub use simulation_config::{LocationSpec, SimulationConfig};
