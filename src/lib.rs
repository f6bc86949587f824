pub mod basic;
pub mod error;
pub mod io;
pub mod renewables;
pub mod simulation;
pub mod timeseries;

pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use crate::error::{Result, SimError};
    pub use crate::io::{LoadNetworkConfig, LocationSpec, NetworkConfig, SimulationConfig};
    pub use crate::renewables::*;
    pub use crate::simulation::{
        Snapshot, SimulationResult, SweepCase, SweepOutcome, run_simulation, run_sweep,
    };
    pub use crate::timeseries::{TimeSeries, TimeSeriesConfig};
    pub use ecs::{
        elements::{GenerationKind, MVar, Megawatts, TransformerDevice, Watts},
        network::{DataOps, PowerFlow, PowerGrid},
        post_processing::PowerFlowResult,
        powerflow::systems::{InitialGuess, PowerFlowConfig},
    };
}
