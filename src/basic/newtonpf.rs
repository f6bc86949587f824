use super::{dsbus_dv::dSbus_dV, solver::Solve, sparse::slice::csc_block};
use crate::basic::sparse::{
    conj::RealImage,
    stack::{csc_hstack, csc_vstack},
};

use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_ITER: usize = 10;

/// Lifecycle of a Newton-Raphson solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverState {
    Initialized,
    Iterating,
    Converged,
    DivergedOrMaxIterExceeded,
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    ToleranceMet,
    MaxIterations,
    SingularJacobian,
    NonFiniteMismatch,
}

/// Final state of [`newton_pf`]. Voltages are in the solver's bus order.
#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    pub v: DVector<Complex64>,
    pub iterations: usize,
    /// Infinity norm of the final P/Q mismatch in per-unit.
    pub max_mismatch: f64,
    pub state: SolverState,
    pub stop_reason: StopReason,
}

impl NewtonOutcome {
    pub fn converged(&self) -> bool {
        self.state == SolverState::Converged
    }
}

/// Newton-Raphson AC power flow in polar coordinates.
///
/// Buses must be ordered `[PV..., PQ..., slack...]`. Unknowns are the angles of all PV and PQ
/// buses followed by the magnitudes of the PQ buses. The mismatch vector is
/// `F = [Re(ΔS)[pv+pq]; Im(ΔS)[pq]]` with `ΔS = V ⊙ conj(Ybus V) - Sbus`, and iteration stops
/// once `max|F| < tolerance` or after `max_iter` Jacobian solves.
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    npv: usize,
    npq: usize,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    solver: &mut Solver,
) -> NewtonOutcome {
    let max_iter = max_iter.unwrap_or(DEFAULT_MAX_ITER);
    let tol = tolerance.unwrap_or(DEFAULT_TOLERANCE);

    let mut v = v_init.clone();
    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());
    let mut v_norm = v_a.map(|va| Complex64::from_polar(1.0, va));

    let n_bus = npq + npv;
    let n_ext = v.len() - n_bus;
    let num_state = npv + 2 * npq;

    let mut F = DVector::zeros(num_state);
    let mut mis = &v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
    assemble_f(&mut F, n_bus, &mis, num_state, npv);
    let mut max_mismatch = inf_norm(&F);

    let mut state = SolverState::Initialized;
    debug!(?state, npv, npq, n_ext, max_mismatch, "newton-raphson start");

    let finish = |v: DVector<Complex64>, iterations: usize, max_mismatch: f64, stop_reason: StopReason| {
        let state = match stop_reason {
            StopReason::ToleranceMet => SolverState::Converged,
            _ => SolverState::DivergedOrMaxIterExceeded,
        };
        match state {
            SolverState::Converged => debug!(iterations, max_mismatch, "power flow converged"),
            _ => warn!(iterations, max_mismatch, ?stop_reason, "power flow did not converge"),
        }
        NewtonOutcome {
            v,
            iterations,
            max_mismatch,
            state,
            stop_reason,
        }
    };

    if !max_mismatch.is_finite() {
        return finish(v, 0, max_mismatch, StopReason::NonFiniteMismatch);
    }
    if max_mismatch < tol {
        return finish(v, 0, max_mismatch, StopReason::ToleranceMet);
    }

    for iteration in 1..=max_iter {
        if state == SolverState::Initialized {
            state = SolverState::Iterating;
            trace!(?state);
        }
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &v_norm);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, npv, n_ext);

        if solver.solve(&jacobian, F.as_mut_slice()).is_err() {
            return finish(v, iteration, max_mismatch, StopReason::SingularJacobian);
        }

        update_v(&mut v_a, &F, n_bus, &mut v_m, npv, num_state, &mut v_norm, &mut v);

        v.component_mul(&(Ybus * &v).conjugate()).sub_to(Sbus, &mut mis);
        assemble_f(&mut F, n_bus, &mis, num_state, npv);
        max_mismatch = inf_norm(&F);
        trace!(iteration, max_mismatch);

        if !max_mismatch.is_finite() {
            return finish(v, iteration, max_mismatch, StopReason::NonFiniteMismatch);
        }
        if max_mismatch < tol {
            return finish(v, iteration, max_mismatch, StopReason::ToleranceMet);
        }
    }
    finish(v, max_iter, max_mismatch, StopReason::MaxIterations)
}

/// Max absolute entry, NaN if any entry is NaN.
fn inf_norm(f: &DVector<f64>) -> f64 {
    f.iter().fold(0.0, |m: f64, &x| {
        if x.is_nan() || m.is_nan() {
            f64::NAN
        } else {
            m.max(x.abs())
        }
    })
}

#[inline(always)]
fn assemble_f(
    f: &mut DVector<f64>,
    n_bus: usize,
    mis: &DVector<Complex64>,
    num_state: usize,
    npv: usize,
) {
    f.rows_range_mut(0..n_bus)
        .zip_apply(&mis.rows_range(0..n_bus), |a, b| *a = b.re);
    f.rows_range_mut(n_bus..num_state)
        .zip_apply(&mis.rows_range(npv..n_bus), |a, b| *a = b.im);
}

#[inline(always)]
#[allow(clippy::too_many_arguments)]
fn update_v(
    v_a: &mut DVector<f64>,
    dx: &DVector<f64>,
    n_bus: usize,
    v_m: &mut DVector<f64>,
    npv: usize,
    num_state: usize,
    v_norm: &mut DVector<Complex64>,
    v: &mut DVector<Complex64>,
) {
    v_a.rows_range_mut(0..n_bus)
        .zip_apply(&dx.rows_range(0..n_bus), |a, b| *a -= b);
    v_m.rows_range_mut(npv..n_bus)
        .zip_apply(&dx.rows_range(n_bus..num_state), |a, b| *a -= b);

    v_norm.zip_apply(&*v_a, |a, va| *a = Complex64::from_polar(1.0, va));
    v.zip_zip_apply(v_norm, v_m, |a, e, vm| *a = vm * e);
}

/// Assembles `J = [[J11, J12], [J21, J22]]` from the complex derivative matrices, dropping
/// the trailing `n_ext` slack rows and columns.
#[allow(non_snake_case)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    n_ext: usize,
) -> CscMatrix<f64> {
    let n_bus = ds_dva.nrows() - n_ext;
    let npq = n_bus - npv;
    let (dva_re, dva_im) = (ds_dva.real(), ds_dva.imag());
    let (dvm_re, dvm_im) = (ds_dvm.real(), ds_dvm.imag());

    let J11 = csc_block(&dva_re, (0, 0), (n_bus, n_bus));
    let J12 = csc_block(&dvm_re, (0, npv), (n_bus, npq));
    let J21 = csc_block(&dva_im, (npv, 0), (npq, n_bus));
    let J22 = csc_block(&dvm_im, (npv, npv), (npq, npq));

    csc_vstack(&[&csc_hstack(&[&J11, &J12]), &csc_hstack(&[&J21, &J22])])
}
