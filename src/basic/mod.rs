pub(crate) mod dsbus_dv;
pub mod newtonpf;

pub mod ecs;
pub mod solver;
pub(crate) mod sparse;
pub use newtonpf::{NewtonOutcome, SolverState, StopReason, newton_pf};
