use nalgebra_sparse::CscMatrix;
use rsparse::{
    data::{self, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU solver backed by `rsparse`.
///
/// The symbolic analysis is reused while the matrix dimension and fill stay the same.
#[derive(Default)]
pub struct RSparseSolver {
    symbolic: Option<(Symb, usize, usize)>,
}

impl Solve for RSparseSolver {
    fn solve(&mut self, a: &CscMatrix<f64>, b: &mut [f64]) -> Result<(), &'static str> {
        let n = a.nrows();
        if n != a.ncols() || n != b.len() {
            return Err("dimension mismatch");
        }
        if n == 0 {
            return Ok(());
        }
        if n == 1 {
            // rsparse's symbolic analysis needs at least two columns
            let pivot = a.values().first().copied().unwrap_or(0.0);
            if pivot == 0.0 || !pivot.is_finite() {
                return Err("singular matrix");
            }
            b[0] /= pivot;
            return if b[0].is_finite() {
                Ok(())
            } else {
                Err("singular matrix")
            };
        }
        let nnz = a.nnz();
        let a = data::Sprs {
            m: n,
            n,
            i: a.row_indices().to_vec(),
            p: a.col_offsets().iter().map(|&v| v as isize).collect(),
            x: a.values().to_vec(),
            nzmax: nnz,
        };
        let stale = !matches!(&self.symbolic, Some((_, dim, fill)) if *dim == n && *fill == nnz);
        if stale {
            self.symbolic = Some((sqr(&a, 1, false), n, nnz));
        }
        let Some((s, _, _)) = self.symbolic.as_mut() else {
            return Err("missing symbolic analysis");
        };
        let num = lu(&a, s, 1e-6).map_err(|_| "LU factorization failed")?;
        let mut x = vec![0.0; n];
        ipvec(&num.pinv, b, &mut x); // x = P*b
        lsolve(&num.l, &mut x); // x = L\x
        usolve(&num.u, &mut x); // x = U\x
        ipvec(&s.q, &x, b); // b = Q*x
        if b.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err("singular matrix")
        }
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(p) => {
            for (k, &bk) in b.iter().enumerate() {
                x[p[k] as usize] = bk;
            }
        }
        None => x.copy_from_slice(b),
    }
}
