use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use super::Solve;

/// Dense LU fallback for small systems, built on `nalgebra`.
#[derive(Default, Debug, Clone, Copy)]
pub struct DenseLuSolver;

impl Solve for DenseLuSolver {
    fn solve(&mut self, a: &CscMatrix<f64>, b: &mut [f64]) -> Result<(), &'static str> {
        if a.nrows() != a.ncols() || a.nrows() != b.len() {
            return Err("dimension mismatch");
        }
        let lu = DMatrix::from(a).lu();
        let mut rhs = DVector::from_column_slice(b);
        if !lu.solve_mut(&mut rhs) {
            return Err("singular matrix");
        }
        b.copy_from_slice(rhs.as_slice());
        Ok(())
    }
}
