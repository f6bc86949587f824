use crate::basic::sparse::conj::Conjugate;
use nalgebra::*;
use nalgebra_sparse::CscMatrix;

/// Sparse diagonal matrix with `d` on the diagonal.
fn diag(d: &DVector<Complex<f64>>) -> CscMatrix<Complex<f64>> {
    let mut m = CscMatrix::identity(d.len());
    m.values_mut().copy_from_slice(d.as_slice());
    m
}

/// Partial derivatives of the complex bus power injections with respect to voltage
/// magnitude and angle.
///
/// Returns `(dS_dVm, dS_dVa)`:
///
/// * `dS_dVm = diag(V) conj(Ybus diag(Vnorm)) + conj(diag(Ibus)) diag(Vnorm)`
/// * `dS_dVa = j diag(V) conj(diag(Ibus) - Ybus diag(V))`
///
/// `Vnorm` is `V / |V|`. See R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
/// their Derivatives using Complex Matrix Notation", MATPOWER Technical Note 2, 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex<f64>>,
    v: &DVector<Complex<f64>>,
    Vnorm: &DVector<Complex<f64>>,
) -> (CscMatrix<Complex<f64>>, CscMatrix<Complex<f64>>) {
    let ibus = Ybus * v;
    let diagV = diag(v);
    let diagVnorm = diag(Vnorm);
    let diagIbus = diag(&ibus);

    let dS_dVm = &diagV * (Ybus * &diagVnorm).conjugate() + diagIbus.conjugate() * &diagVnorm;
    let dS_dVa = &diagV * (diagIbus - Ybus * &diagV).conjugate() * Complex::<f64>::i();
    (dS_dVm, dS_dVa)
}
