//! # Variational Posterior
//!
//! Plain container for the mean-field posterior of a VBPCA model. The engine owns exactly one
//! [`PosteriorState`] and mutates it in place; this module only knows how to initialise it and
//! how to derive the Gamma means from it.

use crate::error::{Degeneracy, Factor, VbpcaError};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Current variational parameters of all posterior factors.
///
/// Shapes, with `D` observed dimensions, `N` observations and `Q` latent dimensions:
/// - latent coordinates: mean `Q×N`, shared covariance `Q×Q`
/// - loadings: mean `D×Q`, shared row covariance `Q×Q`
/// - mean vector: mean `D`, covariance `mu_variance · I_D`
/// - relevance precision: Gamma with shape `alpha_a` and rates `alpha_b` (`Q`)
/// - noise precision: Gamma with shape `gamma_a` and rate `gamma_b`
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorState {
    pub(crate) x_mean: Array2<f64>,
    pub(crate) x_cov: Array2<f64>,
    pub(crate) w_mean: Array2<f64>,
    pub(crate) w_cov: Array2<f64>,
    pub(crate) mu_mean: Array1<f64>,
    pub(crate) mu_variance: f64,
    pub(crate) alpha_a: f64,
    pub(crate) alpha_b: Array1<f64>,
    pub(crate) gamma_a: f64,
    pub(crate) gamma_b: f64,
}

impl PosteriorState {
    /// Allocates the posterior for `n` observations of dimension `d` with `q` latent dimensions.
    ///
    /// Means are drawn from independent standard normals in the order latent coordinates,
    /// loadings, mean vector (each row-major). Covariances start as identities and every Gamma
    /// shape/rate as one. The caller guarantees `q <= d` and `n >= 1`.
    pub fn initialize<R: Rng + ?Sized>(n: usize, d: usize, q: usize, rng: &mut R) -> Self {
        let mut draw = || -> f64 { StandardNormal.sample(&mut *rng) };

        let x_mean = Array2::from_shape_simple_fn((q, n), &mut draw);
        let w_mean = Array2::from_shape_simple_fn((d, q), &mut draw);
        let mu_mean = Array1::from_shape_simple_fn(d, &mut draw);

        Self {
            x_mean,
            x_cov: Array2::eye(q),
            w_mean,
            w_cov: Array2::eye(q),
            mu_mean,
            mu_variance: 1.0,
            alpha_a: 1.0,
            alpha_b: Array1::ones(q),
            gamma_a: 1.0,
            gamma_b: 1.0,
        }
    }

    /// Posterior mean of the noise precision, `gamma_a / gamma_b`.
    pub fn gamma_mean(&self) -> Result<f64, VbpcaError> {
        let rate =
            checked_rate(self.gamma_b).map_err(|c| VbpcaError::degenerate(Factor::Noise, c))?;
        Ok(self.gamma_a / rate)
    }

    /// Posterior means of the per-component relevance precisions, `alpha_a / alpha_b[q]`.
    pub fn relevance_mean(&self) -> Result<Array1<f64>, VbpcaError> {
        for &rate in self.alpha_b.iter() {
            checked_rate(rate).map_err(|c| VbpcaError::degenerate(Factor::Relevance, c))?;
        }
        Ok(self.alpha_b.mapv(|rate| self.alpha_a / rate))
    }

    /// Expected noise variance, the inverse of [`gamma_mean`](Self::gamma_mean).
    pub fn noise_variance(&self) -> Result<f64, VbpcaError> {
        Ok(self.gamma_mean()?.recip())
    }

    pub fn x_mean(&self) -> &Array2<f64> {
        &self.x_mean
    }

    pub fn x_cov(&self) -> &Array2<f64> {
        &self.x_cov
    }

    pub fn w_mean(&self) -> &Array2<f64> {
        &self.w_mean
    }

    pub fn w_cov(&self) -> &Array2<f64> {
        &self.w_cov
    }

    pub fn mu_mean(&self) -> &Array1<f64> {
        &self.mu_mean
    }

    /// Covariance of the mean vector. Always isotropic, so it is materialised on demand.
    pub fn mu_cov(&self) -> Array2<f64> {
        Array2::eye(self.mu_mean.len()) * self.mu_variance
    }

    pub fn mu_variance(&self) -> f64 {
        self.mu_variance
    }

    pub fn alpha_shape(&self) -> f64 {
        self.alpha_a
    }

    pub fn alpha_rate(&self) -> &Array1<f64> {
        &self.alpha_b
    }

    pub fn gamma_shape(&self) -> f64 {
        self.gamma_a
    }

    pub fn gamma_rate(&self) -> f64 {
        self.gamma_b
    }
}

fn checked_rate(rate: f64) -> Result<f64, Degeneracy> {
    if rate > 0.0 && rate.is_finite() {
        Ok(rate)
    } else {
        Err(Degeneracy::InvalidRate(rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_initialize_shapes() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let state = PosteriorState::initialize(10, 4, 3, &mut rng);

        assert_eq!(state.x_mean().dim(), (3, 10));
        assert_eq!(state.x_cov(), &Array2::<f64>::eye(3));
        assert_eq!(state.w_mean().dim(), (4, 3));
        assert_eq!(state.w_cov(), &Array2::<f64>::eye(3));
        assert_eq!(state.mu_mean().len(), 4);
        assert_eq!(state.mu_cov(), Array2::<f64>::eye(4));
        assert_eq!(state.alpha_shape(), 1.0);
        assert_eq!(state.alpha_rate(), &Array1::<f64>::ones(3));
        assert_eq!(state.gamma_shape(), 1.0);
        assert_eq!(state.gamma_rate(), 1.0);
    }

    #[test]
    fn test_initialize_is_deterministic_per_seed() {
        let a = PosteriorState::initialize(5, 3, 2, &mut ChaCha8Rng::seed_from_u64(1));
        let b = PosteriorState::initialize(5, 3, 2, &mut ChaCha8Rng::seed_from_u64(1));
        let c = PosteriorState::initialize(5, 3, 2, &mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(a, b);
        assert_ne!(a.x_mean(), c.x_mean());
    }

    #[test]
    fn test_initial_means_look_standard_normal() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let state = PosteriorState::initialize(2000, 5, 4, &mut rng);
        let mean = state.x_mean().mean().unwrap();
        let var = state.x_mean().var(0.0);
        assert!(mean.abs() < 0.1, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }

    #[test]
    fn test_gamma_means() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state = PosteriorState::initialize(4, 3, 2, &mut rng);
        state.gamma_a = 6.0;
        state.gamma_b = 2.0;
        state.alpha_a = 2.5;
        state.alpha_b = Array1::from(vec![0.5, 5.0]);

        assert_relative_eq!(state.gamma_mean().unwrap(), 3.0);
        assert_relative_eq!(state.noise_variance().unwrap(), 1.0 / 3.0);
        let relevance = state.relevance_mean().unwrap();
        assert_relative_eq!(relevance[0], 5.0);
        assert_relative_eq!(relevance[1], 0.5);
    }

    #[test]
    fn test_degenerate_rates() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state = PosteriorState::initialize(4, 3, 2, &mut rng);

        state.gamma_b = 0.0;
        assert!(matches!(
            state.gamma_mean(),
            Err(VbpcaError::NumericDegeneracy {
                factor: Factor::Noise,
                cause: Degeneracy::InvalidRate(_)
            })
        ));

        state.gamma_b = 1.0;
        state.alpha_b[1] = f64::NAN;
        assert!(matches!(
            state.relevance_mean(),
            Err(VbpcaError::NumericDegeneracy {
                factor: Factor::Relevance,
                ..
            })
        ));
    }
}
