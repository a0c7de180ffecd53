use crate::error::Degeneracy;
use crate::utils::{AllFinite, ColumnNorms, SymmetricInverse};
use nalgebra::{Cholesky, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Dimension, Ix2};
use nshare::{IntoNalgebra, IntoNdarray2};

impl SymmetricInverse for Array2<f64> {
    type Output = Array2<f64>;

    fn spd_inverse(&self, max_condition: f64) -> Result<Array2<f64>, Degeneracy> {
        let condition = self.condition_number()?;
        if !(condition <= max_condition) {
            return Err(Degeneracy::IllConditioned {
                condition,
                threshold: max_condition,
            });
        }

        let mut symmetric = self.as_standard_layout().into_owned();
        symmetric.symmetrize();
        let cholesky =
            Cholesky::new(symmetric.into_nalgebra()).ok_or(Degeneracy::FactorizationFailed)?;

        let mut inverse = cholesky.inverse().into_ndarray2().into_owned();
        inverse.symmetrize();
        if !inverse.all_finite() {
            return Err(Degeneracy::NonFinite);
        }
        Ok(inverse)
    }

    fn condition_number(&self) -> Result<f64, Degeneracy> {
        let (rows, cols) = self.dim();
        if rows != cols {
            return Err(Degeneracy::NotSquare(rows, cols));
        }
        if !self.all_finite() {
            return Err(Degeneracy::NonFinite);
        }

        let mut symmetric = self.as_standard_layout().into_owned();
        symmetric.symmetrize();
        let eigen = SymmetricEigen::new(symmetric.into_nalgebra());
        let (smallest, largest) = eigen
            .eigenvalues
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if !(smallest > 0.0) {
            return Err(Degeneracy::NotPositiveDefinite(smallest));
        }
        Ok(largest / smallest)
    }

    /// Panics if the matrix is not square.
    fn symmetrize(&mut self) {
        let transposed = self.t().to_owned();
        *self += &transposed;
        *self *= 0.5;
    }
}

impl<S> ColumnNorms for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn column_sq_norms(&self) -> Array1<f64> {
        self.map_axis(Axis(0), |column| column.dot(&column))
    }
}

impl<S, D> AllFinite for ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}
