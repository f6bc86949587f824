use nalgebra::Scalar;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use simba::scalar::ComplexField;

/// Applies `f` to every stored value, keeping the sparsity pattern.
pub(crate) fn map_values<T, U: Scalar>(
    mat: &CscMatrix<T>,
    f: impl FnMut(&T) -> U,
) -> CscMatrix<U> {
    let values: Vec<U> = mat.values().iter().map(f).collect();
    debug_assert_eq!(values.len(), mat.nnz());
    CscMatrix::try_from_pattern_and_values(mat.pattern().clone(), values)
        .unwrap_or_else(|_| CscMatrix::zeros(mat.nrows(), mat.ncols()))
}

/// Trait for complex conjugate operation.
pub trait Conjugate {
    /// Returns the complex conjugate of the matrix.
    fn conjugate(&self) -> Self;

    fn conjugate_mut(&mut self);
}

/// Splits a complex matrix into its real and imaginary parts, same pattern for both.
pub trait RealImage {
    fn real(&self) -> CscMatrix<f64>;
    fn imag(&self) -> CscMatrix<f64>;
}

impl Conjugate for CscMatrix<Complex64> {
    fn conjugate(&self) -> Self {
        let mut out = self.clone();
        out.conjugate_mut();
        out
    }

    fn conjugate_mut(&mut self) {
        for v in self.values_mut() {
            *v = ComplexField::conjugate(*v);
        }
    }
}

impl RealImage for CscMatrix<Complex64> {
    fn real(&self) -> CscMatrix<f64> {
        map_values(self, |v| ComplexField::real(*v))
    }
    fn imag(&self) -> CscMatrix<f64> {
        map_values(self, |v| ComplexField::imaginary(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn test_conjugate_and_parts() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, Complex64::new(1.0, 2.0));
        coo.push(1, 0, Complex64::new(-3.0, 0.5));
        let m = CscMatrix::from(&coo);

        let c = m.conjugate();
        assert_eq!(c.values()[0], Complex64::new(1.0, -2.0));
        assert_eq!(m.real().values(), &[1.0, -3.0]);
        assert_eq!(m.imag().values(), &[2.0, 0.5]);
        assert_eq!(c.nnz(), m.nnz());

        let mut d = m.clone();
        d.conjugate_mut();
        assert_eq!(d, c);
    }
}
