use bevy_ecs::prelude::*;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use num_traits::One;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::init::{PVBus, SlackBus};
use crate::basic::{
    ecs::{elements::*, network::PowerFlowSolver},
    newtonpf::{DEFAULT_MAX_ITER, DEFAULT_TOLERANCE, NewtonOutcome, newton_pf},
    solver::{DenseLuSolver, Solve},
};

/// Starting voltage of one bus for a custom initial guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusVoltageGuess {
    pub vm_pu: f64,
    #[serde(default)]
    pub va_degree: f64,
}

/// Initial voltages handed to Newton-Raphson.
///
/// Slack and PV magnitudes (and the slack angle) are always overwritten by their setpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialGuess {
    /// All buses at 1.0 pu, 0°.
    #[default]
    FlatStart,
    /// One entry per bus, indexed by bus id.
    Custom(Vec<BusVoltageGuess>),
}

/// Linear solver used for the Newton step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolver {
    #[default]
    SparseLu,
    DenseLu,
}

#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowConfig {
    pub max_it: usize,
    /// Infinity-norm tolerance on the P/Q mismatch, per-unit.
    pub tol: f64,
    pub init: InitialGuess,
    pub linear_solver: LinearSolver,
}

impl Default for PowerFlowConfig {
    fn default() -> Self {
        Self {
            max_it: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOLERANCE,
            init: InitialGuess::FlatStart,
            linear_solver: LinearSolver::SparseLu,
        }
    }
}

/// Matrices of one solve, buses reordered as `[PV..., PQ..., slack]`.
#[derive(Debug, Resource, Clone)]
pub struct PowerFlowMat {
    pub y_bus: CscMatrix<Complex64>,
    pub s_bus: DVector<Complex64>,
    pub v_bus_init: DVector<Complex64>,
    pub npv: usize,
    pub npq: usize,
    /// bus id → solver position
    pub to_perm: Vec<usize>,
    /// solver position → bus id
    pub from_perm: Vec<i64>,
}

impl PowerFlowMat {
    /// Reorders a solver-ordered vector back to bus id order.
    pub fn to_bus_order<T: Copy>(&self, x: &DVector<T>) -> Vec<T> {
        self.to_perm.iter().map(|&k| x[k]).collect()
    }
}

/// Raw Newton-Raphson outcome, voltages in solver order.
#[derive(Debug, Resource, Clone)]
pub struct SolverOutput(pub NewtonOutcome);

/// Builds the bus admittance matrix as `A diag(y) Aᵀ`, with `A` the branch incidence matrix.
///
/// Rows follow `to_perm`; ground ends are dropped, leaving shunt terms on the diagonal.
pub(crate) fn create_y_bus<'a>(
    sbase: f64,
    to_perm: &[usize],
    branches: impl Iterator<Item = (&'a Admittance, &'a Port2, &'a VBase)>,
) -> CscMatrix<Complex64> {
    let nodes = to_perm.len();
    let mut admittances = Vec::new();
    let mut triplets = Vec::new();
    for (br, (y, port, v_base)) in branches.enumerate() {
        admittances.push(y.0 * v_base.0.powi(2) / sbase);
        for (end, sign) in [(port[0], 1.0), (port[1], -1.0)] {
            if end >= 0 {
                triplets.push((to_perm[end as usize], br, Complex64::new(sign, 0.0)));
            }
        }
    }
    let mut incidence = CooMatrix::new(nodes, admittances.len());
    for (i, j, v) in triplets {
        incidence.push(i, j, v);
    }
    let a = CscMatrix::from(&incidence);
    let mut y_diag = CscMatrix::identity(admittances.len());
    y_diag.values_mut().copy_from_slice(&admittances);
    &a * &(y_diag * a.transpose())
}

/// Assembles [`PowerFlowMat`] from the tagged buses and the admittance branches.
pub fn init_states(
    mut cmd: Commands,
    common: Res<PFCommonData>,
    buses: Query<(&BusID, &VBusPu, &SBusPu, Has<PVBus>, Has<SlackBus>)>,
    branches: Query<(&Admittance, &Port2, &VBase)>,
) {
    let mut rows: Vec<_> = buses.iter().collect();
    rows.sort_by_key(|(id, ..)| **id);

    let (mut pv, mut pq, mut ext) = (Vec::new(), Vec::new(), Vec::new());
    for (id, _, _, is_pv, is_slack) in &rows {
        match (*is_slack, *is_pv) {
            (true, _) => ext.push(id.0),
            (false, true) => pv.push(id.0),
            _ => pq.push(id.0),
        }
    }
    let from_perm: Vec<i64> = pv.iter().chain(&pq).chain(&ext).copied().collect();
    let mut to_perm = vec![0; from_perm.len()];
    for (k, &id) in from_perm.iter().enumerate() {
        to_perm[id as usize] = k;
    }

    let n = rows.len();
    let mut s_bus = DVector::zeros(n);
    let mut v_bus_init = DVector::from_element(n, Complex64::one());
    for (id, v, s, ..) in &rows {
        let k = to_perm[id.0 as usize];
        s_bus[k] = s.0;
        v_bus_init[k] = v.0;
    }

    let y_bus = create_y_bus(common.sbase, &to_perm, branches.iter());
    debug!(npv = pv.len(), npq = pq.len(), nnz = y_bus.nnz(), "power flow matrices ready");
    cmd.insert_resource(PowerFlowMat {
        y_bus,
        s_bus,
        v_bus_init,
        npv: pv.len(),
        npq: pq.len(),
        to_perm,
        from_perm,
    });
}

fn solve_with<S: Solve>(mat: &PowerFlowMat, cfg: &PowerFlowConfig, solver: &mut S) -> NewtonOutcome {
    newton_pf(
        &mat.y_bus,
        &mat.s_bus,
        &mat.v_bus_init,
        mat.npv,
        mat.npq,
        Some(cfg.tol),
        Some(cfg.max_it),
        solver,
    )
}

/// ECS system that runs Newton-Raphson on the current [`PowerFlowMat`].
pub fn ecs_run_pf(
    mut cmd: Commands,
    mat: Res<PowerFlowMat>,
    cfg: Res<PowerFlowConfig>,
    mut solver: ResMut<PowerFlowSolver>,
) {
    let outcome = match cfg.linear_solver {
        LinearSolver::SparseLu => {
            solver.solver.reset();
            solve_with(&mat, &cfg, &mut solver.solver)
        }
        LinearSolver::DenseLu => solve_with(&mat, &cfg, &mut DenseLuSolver),
    };
    cmd.insert_resource(SolverOutput(outcome));
}
