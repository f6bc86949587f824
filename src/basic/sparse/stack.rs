use nalgebra_sparse::{CooMatrix, CscMatrix};

fn push_shifted(coo: &mut CooMatrix<f64>, mat: &CscMatrix<f64>, row_offset: usize, col_offset: usize) {
    for (i, j, v) in mat.triplet_iter() {
        coo.push(i + row_offset, j + col_offset, *v);
    }
}

/// Horizontally concatenates matrices with the same row count.
pub fn csc_hstack(mats: &[&CscMatrix<f64>]) -> CscMatrix<f64> {
    let nrows = mats.first().map_or(0, |m| m.nrows());
    let ncols = mats.iter().map(|m| m.ncols()).sum();
    let mut coo = CooMatrix::new(nrows, ncols);
    let mut offset = 0;
    for m in mats {
        debug_assert_eq!(m.nrows(), nrows);
        push_shifted(&mut coo, m, 0, offset);
        offset += m.ncols();
    }
    CscMatrix::from(&coo)
}

/// Vertically concatenates matrices with the same column count.
pub fn csc_vstack(mats: &[&CscMatrix<f64>]) -> CscMatrix<f64> {
    let ncols = mats.first().map_or(0, |m| m.ncols());
    let nrows = mats.iter().map(|m| m.nrows()).sum();
    let mut coo = CooMatrix::new(nrows, ncols);
    let mut offset = 0;
    for m in mats {
        debug_assert_eq!(m.ncols(), ncols);
        push_shifted(&mut coo, m, offset, 0);
        offset += m.nrows();
    }
    CscMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn test_stack() {
        let a = CscMatrix::from(&DMatrix::from_row_slice(2, 1, &[1.0, 2.0]));
        let b = CscMatrix::from(&DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 4.0]));
        let h = csc_hstack(&[&a, &b]);
        assert_eq!(
            DMatrix::from(&h),
            DMatrix::from_row_slice(2, 3, &[1.0, 3.0, 0.0, 2.0, 0.0, 4.0])
        );

        let c = CscMatrix::from(&DMatrix::from_row_slice(1, 3, &[5.0, 6.0, 7.0]));
        let v = csc_vstack(&[&h, &c]);
        assert_eq!(v.nrows(), 3);
        assert_eq!(DMatrix::from(&v)[(2, 1)], 6.0);
        assert_eq!(DMatrix::from(&v)[(1, 2)], 4.0);
    }
}
