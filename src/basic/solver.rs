mod dense;
mod sparse_lu;

pub use dense::*;
pub use sparse_lu::*;

use nalgebra_sparse::CscMatrix;

pub type DefaultSolver = RSparseSolver;

/// A trait for solving the square sparse linear systems of a Newton step.
pub trait Solve {
    /// Solves `a x = b` in place: on success `b` holds `x`.
    fn solve(&mut self, a: &CscMatrix<f64>, b: &mut [f64]) -> Result<(), &'static str>;

    /// Drops any cached factorisation state.
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn system() -> (CscMatrix<f64>, DVector<f64>) {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 3.0]);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let b = &a * &x;
        (CscMatrix::from(&a), b)
    }

    fn check<S: Solve>(solver: &mut S) {
        let (a, b) = system();
        for _ in 0..2 {
            let mut rhs = b.clone();
            solver.solve(&a, rhs.as_mut_slice()).unwrap();
            for (got, want) in rhs.iter().zip([1.0, 2.0, 3.0]) {
                assert!((got - want).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_rsparse_solver() {
        check(&mut RSparseSolver::default());
    }

    #[test]
    fn test_dense_solver() {
        check(&mut DenseLuSolver);
    }

    #[test]
    fn test_scalar_system() {
        let a = CscMatrix::from(&DMatrix::from_row_slice(1, 1, &[2.0]));
        let mut b = [4.0];
        RSparseSolver::default().solve(&a, &mut b).unwrap();
        assert_eq!(b, [2.0]);
        let mut b = [4.0];
        DenseLuSolver.solve(&a, &mut b).unwrap();
        assert_eq!(b, [2.0]);

        let zero = CscMatrix::from(&DMatrix::from_row_slice(1, 1, &[0.0]));
        assert!(RSparseSolver::default().solve(&zero, &mut [1.0]).is_err());
    }

    #[test]
    fn test_dense_solver_singular() {
        let a = CscMatrix::from(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]));
        let mut b = [1.0, 1.0];
        assert!(DenseLuSolver.solve(&a, &mut b).is_err());
    }
}
