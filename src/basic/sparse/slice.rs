use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Copies the `shape` block starting at `start` (row, col) out of `mat`.
///
/// Empty shapes are allowed and produce an empty matrix.
pub fn csc_block(mat: &CscMatrix<f64>, start: (usize, usize), shape: (usize, usize)) -> CscMatrix<f64> {
    let (r0, c0) = start;
    let (nrows, ncols) = shape;
    debug_assert!(r0 + nrows <= mat.nrows() && c0 + ncols <= mat.ncols());

    let mut coo = CooMatrix::new(nrows, ncols);
    for j in 0..ncols {
        let col = mat.col(c0 + j);
        for (&i, &v) in col.row_indices().iter().zip(col.values()) {
            if i >= r0 && i < r0 + nrows {
                coo.push(i - r0, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}
