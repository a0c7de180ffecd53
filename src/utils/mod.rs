use crate::error::Degeneracy;
use ndarray::Array1;

/// Inversion of symmetric positive-definite matrices with a conditioning guard.
pub trait SymmetricInverse {
    type Output;

    /// Inverts `self`, refusing matrices that are not finite, not positive-definite, or whose
    /// condition number exceeds `max_condition`.
    fn spd_inverse(&self, max_condition: f64) -> Result<Self::Output, Degeneracy>;

    /// Ratio of the largest to the smallest eigenvalue.
    fn condition_number(&self) -> Result<f64, Degeneracy>;

    /// Replaces `self` with `(self + selfᵗ) / 2`.
    fn symmetrize(&mut self);
}

pub trait ColumnNorms {
    /// Squared Euclidean norm of each column
    fn column_sq_norms(&self) -> Array1<f64>;

    fn column_norms(&self) -> Array1<f64> {
        self.column_sq_norms().mapv(f64::sqrt)
    }
}

pub trait AllFinite {
    fn all_finite(&self) -> bool;
}
