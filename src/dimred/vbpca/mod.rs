//! # Variational Bayesian Principal Component Analysis
//!
//! Linear latent-variable model `y = W·x + mu + noise` fitted by mean-field variational
//! inference. The number of latent dimensions is fixed at `D - 1`; automatic relevance
//! determination (ARD) on the loading columns switches off the components the data does not
//! support.
//!
//! The engine performs one coordinate-ascent sweep per call to [`VBPCA::update`], refining the
//! factors in the order mean vector, loadings, latent coordinates, relevance precision, noise
//! precision. Each step reads the values produced by the previous steps of the same sweep.
//! Deciding how many sweeps to run is left to the caller.
//!
//! Observations are stored one per column (`D×N`).

mod posterior;
mod shared;

pub use posterior::PosteriorState;
pub use shared::SharedVBPCA;

use crate::error::{Degeneracy, Factor, VbpcaError};
use crate::utils::{AllFinite, ColumnNorms, SymmetricInverse};
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;

/// Loading-norm ratio, relative to the strongest component, above which a component counts as
/// active in sweep reports.
pub const ACTIVE_COMPONENT_RATIO: f64 = 1e-2;

/// Fixed prior parameters of the model.
///
/// - `alpha_shape`, `alpha_rate`: Gamma prior on each relevance precision
/// - `gamma_shape`, `gamma_rate`: Gamma prior on the noise precision
/// - `beta`: precision of the zero-mean Gaussian prior on the mean vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperpriors {
    pub alpha_shape: f64,
    pub alpha_rate: f64,
    pub gamma_shape: f64,
    pub gamma_rate: f64,
    pub beta: f64,
}

impl Default for Hyperpriors {
    fn default() -> Self {
        Self {
            alpha_shape: 1.0,
            alpha_rate: 1.0,
            gamma_shape: 1.0,
            gamma_rate: 1.0,
            beta: 1.0,
        }
    }
}

impl Hyperpriors {
    /// Checks that every parameter is strictly positive and finite.
    pub fn validate(&self) -> Result<(), VbpcaError> {
        let values = [
            ("alpha shape", self.alpha_shape),
            ("alpha rate", self.alpha_rate),
            ("gamma shape", self.gamma_shape),
            ("gamma rate", self.gamma_rate),
            ("beta", self.beta),
        ];
        for (name, value) in values {
            if !(value > 0.0 && value.is_finite()) {
                return Err(VbpcaError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Variational Bayesian PCA engine.
///
/// Owns the observation matrix (`D×N`), the hyperpriors and the current [`PosteriorState`].
/// Construct it with [`VBPCA::new`] or through [`VBPCABuilder`].
#[derive(Debug, Clone)]
pub struct VBPCA {
    y: Array2<f64>,
    n_features: usize,
    n_observations: usize,
    n_components: usize,
    hyperpriors: Hyperpriors,
    condition_threshold: f64,
    verbose: bool,
    sweeps: usize,
    posterior: PosteriorState,
}

impl VBPCA {
    /// Creates an engine with default hyperpriors and a fixed-seed random initialisation.
    ///
    /// # Parameters
    /// - `y`: observations, one per column (`D×N`, `D >= 2`, `N >= 1`, all finite)
    ///
    /// # Returns
    /// - `Err(VbpcaError::InvalidShape)`: `D < 2`, `N < 1` or non-finite observations
    pub fn new(y: Array2<f64>) -> Result<Self, VbpcaError> {
        VBPCABuilder::new().build(y)
    }

    fn from_parts<R: Rng + ?Sized>(
        y: Array2<f64>,
        hyperpriors: Hyperpriors,
        condition_threshold: f64,
        verbose: bool,
        rng: &mut R,
    ) -> Result<Self, VbpcaError> {
        let (n_features, n_observations) = check_observations(&y)?;
        let n_components = n_features - 1;
        let posterior = PosteriorState::initialize(n_observations, n_features, n_components, rng);

        if verbose {
            info!("VBPCA initialised:");
            info!(
                "  Input shape: {} features × {} observations",
                n_features, n_observations
            );
            info!("  Latent components: {}", n_components);
        }

        Ok(Self {
            y,
            n_features,
            n_observations,
            n_components,
            hyperpriors,
            condition_threshold,
            verbose,
            sweeps: 0,
            posterior,
        })
    }

    /// Runs one full coordinate-ascent sweep over all posterior factors.
    ///
    /// # Returns
    /// - `Err(VbpcaError::NumericDegeneracy)`: an inversion was refused or a posterior became
    ///   non-finite. The posterior may be partially updated and should be discarded.
    pub fn update(&mut self) -> Result<(), VbpcaError> {
        self.update_mean()?;
        self.update_loadings()?;
        self.update_latent()?;
        self.update_relevance()?;
        self.update_noise()?;
        self.sweeps += 1;

        let gamma = self.posterior.gamma_mean()?;
        if self.verbose {
            info!(
                "Sweep {}: noise variance {:.6e}, {} active components",
                self.sweeps,
                gamma.recip(),
                self.active_components(ACTIVE_COMPONENT_RATIO).len()
            );
        } else {
            debug!("VBPCA sweep {} done, gamma mean {:.6e}", self.sweeps, gamma);
        }
        Ok(())
    }

    /// Runs `iterations` sweeps. Stopping criteria are the caller's business.
    pub fn fit(&mut self, iterations: usize) -> Result<&mut Self, VbpcaError> {
        for _ in 0..iterations {
            self.update()?;
        }
        Ok(self)
    }

    /// Runs `iterations` sweeps and returns the fitted latent coordinates (`Q×N`).
    pub fn fit_transform(&mut self, iterations: usize) -> Result<Array2<f64>, VbpcaError> {
        self.fit(iterations)?;
        Ok(self.transform())
    }

    /// Fitted latent coordinates of the training observations (`Q×N`).
    pub fn transform(&self) -> Array2<f64> {
        self.posterior.x_mean.clone()
    }

    /// Projects new observations (`D×M`, one per column) into the latent space.
    ///
    /// Uses the posterior means only: `(WᵗW + γ⁻¹I)⁻¹ Wᵗ (y - mu)`. Does not touch the posterior,
    /// so it can be called before the first sweep, although the result is meaningless then.
    ///
    /// # Returns
    /// - `Ok(Array2<f64>)`: latent coordinates (`Q×M`)
    /// - `Err(VbpcaError::InvalidShape)`: row count differs from `D`
    /// - `Err(VbpcaError::NumericDegeneracy)`: the projection matrix cannot be inverted
    pub fn transform_new(&self, y: ArrayView2<f64>) -> Result<Array2<f64>, VbpcaError> {
        if y.nrows() != self.n_features {
            return Err(VbpcaError::InvalidShape(format!(
                "expected {} rows in query, got {}",
                self.n_features,
                y.nrows()
            )));
        }

        let gamma = self.posterior.gamma_mean()?;
        let w_mean = &self.posterior.w_mean;
        let m = w_mean.t().dot(w_mean) + Array2::<f64>::eye(self.n_components) * gamma.recip();
        let m = self.invert(&m, Factor::Projection)?;

        Ok(m.dot(&w_mean.t()).dot(&self.centered(y)))
    }

    /// Single-point version of [`transform_new`](Self::transform_new).
    pub fn transform_vector(&self, y: ArrayView1<f64>) -> Result<Array1<f64>, VbpcaError> {
        let projected = self.transform_new(y.insert_axis(Axis(1)))?;
        Ok(projected.column(0).to_owned())
    }

    /// Maps latent points (`Q×M`) back to observation space: `W·x + mu`.
    pub fn inverse_transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, VbpcaError> {
        if x.nrows() != self.n_components {
            return Err(VbpcaError::InvalidShape(format!(
                "expected {} rows in latent points, got {}",
                self.n_components,
                x.nrows()
            )));
        }
        Ok(self.posterior.w_mean.dot(&x) + &self.mu_column())
    }

    /// Posterior-mean reconstruction of the training data (`D×N`).
    pub fn reconstruct(&self) -> Array2<f64> {
        self.posterior.w_mean.dot(&self.posterior.x_mean) + &self.mu_column()
    }

    /// Frobenius norm of `Y - W·X - mu` on the training data.
    pub fn reconstruction_error(&self) -> f64 {
        (&self.y - &self.reconstruct())
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }

    /// Posterior mean of each relevance precision. Large values mark pruned components.
    pub fn relevance(&self) -> Result<Array1<f64>, VbpcaError> {
        self.posterior.relevance_mean()
    }

    /// Euclidean norm of each loading column.
    pub fn component_norms(&self) -> Array1<f64> {
        self.posterior.w_mean.column_norms()
    }

    /// Indices of the components whose loading norm is at least `ratio` times the largest one,
    /// ordered by decreasing norm.
    pub fn active_components(&self, ratio: f64) -> Vec<usize> {
        let norms = self.component_norms();
        let largest = norms.iter().cloned().fold(0.0, f64::max);
        if largest <= 0.0 {
            return Vec::new();
        }

        let mut active: Vec<usize> = (0..norms.len())
            .filter(|&q| norms[q] >= ratio * largest)
            .collect();
        active.sort_by(|&a, &b| norms[b].partial_cmp(&norms[a]).unwrap_or(Ordering::Equal));
        active
    }

    pub fn noise_variance(&self) -> Result<f64, VbpcaError> {
        self.posterior.noise_variance()
    }

    pub fn posterior(&self) -> &PosteriorState {
        &self.posterior
    }

    pub fn hyperpriors(&self) -> &Hyperpriors {
        &self.hyperpriors
    }

    pub fn observations(&self) -> &Array2<f64> {
        &self.y
    }

    /// Observed dimensionality `D`.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// Latent dimensionality `Q = D - 1`.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn condition_threshold(&self) -> f64 {
        self.condition_threshold
    }

    /// Number of completed sweeps.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    fn update_mean(&mut self) -> Result<(), VbpcaError> {
        let gamma = self.posterior.gamma_mean()?;
        let n = self.n_observations as f64;
        let variance = (self.hyperpriors.beta + n * gamma).recip();

        let residual = &self.y - &self.posterior.w_mean.dot(&self.posterior.x_mean);
        let mu_mean = residual.sum_axis(Axis(1)) * (gamma * variance);
        if !mu_mean.all_finite() {
            return Err(VbpcaError::degenerate(Factor::Mean, Degeneracy::NonFinite));
        }

        trace!("mean update: variance {:.6e}", variance);
        self.posterior.mu_variance = variance;
        self.posterior.mu_mean = mu_mean;
        Ok(())
    }

    fn update_loadings(&mut self) -> Result<(), VbpcaError> {
        let gamma = self.posterior.gamma_mean()?;
        let relevance = self.posterior.relevance_mean()?;
        let x_mean = &self.posterior.x_mean;

        let scatter = x_mean.dot(&x_mean.t());
        let precision = Array2::from_diag(&relevance) + scatter * gamma;
        let w_cov = self.invert(&precision, Factor::Loading)?;

        let centered = self.centered(self.y.view());
        let w_mean = (w_cov.dot(&x_mean.dot(&centered.t())) * gamma).reversed_axes();
        if !w_mean.all_finite() {
            return Err(VbpcaError::degenerate(Factor::Loading, Degeneracy::NonFinite));
        }

        trace!("loading update: relevance {:?}", relevance.as_slice());
        self.posterior.w_cov = w_cov;
        self.posterior.w_mean = w_mean;
        Ok(())
    }

    fn update_latent(&mut self) -> Result<(), VbpcaError> {
        let gamma = self.posterior.gamma_mean()?;
        let w_mean = &self.posterior.w_mean;

        let precision = Array2::<f64>::eye(self.n_components) + w_mean.t().dot(w_mean) * gamma;
        let x_cov = self.invert(&precision, Factor::Latent)?;

        let centered = self.centered(self.y.view());
        let x_mean = x_cov.dot(&w_mean.t()).dot(&centered) * gamma;
        if !x_mean.all_finite() {
            return Err(VbpcaError::degenerate(Factor::Latent, Degeneracy::NonFinite));
        }

        self.posterior.x_cov = x_cov;
        self.posterior.x_mean = x_mean;
        Ok(())
    }

    fn update_relevance(&mut self) -> Result<(), VbpcaError> {
        let prior = self.hyperpriors;
        let rates = self
            .posterior
            .w_mean
            .column_sq_norms()
            .mapv(|sq_norm| prior.alpha_rate + 0.5 * sq_norm);
        if !rates.all_finite() {
            return Err(VbpcaError::degenerate(Factor::Relevance, Degeneracy::NonFinite));
        }

        self.posterior.alpha_a = prior.alpha_shape + 0.5 * self.n_features as f64;
        self.posterior.alpha_b = rates;
        Ok(())
    }

    fn update_noise(&mut self) -> Result<(), VbpcaError> {
        let prior = self.hyperpriors;
        let w_mean = &self.posterior.w_mean;
        let mu_mean = &self.posterior.mu_mean;
        let ww = w_mean.t().dot(w_mean);
        let mu_sq = mu_mean.dot(mu_mean);

        // E‖y - Wx - mu‖², expanded and accumulated per observation
        let mut rate = prior.gamma_rate;
        for (y_n, x_n) in self.y.columns().into_iter().zip(self.posterior.x_mean.columns()) {
            let wx = w_mean.dot(&x_n);
            rate += y_n.dot(&y_n) + mu_sq;
            rate += x_n.dot(&ww.dot(&x_n));
            rate += 2.0 * mu_mean.dot(&wx);
            rate -= 2.0 * y_n.dot(&wx);
            rate -= 2.0 * y_n.dot(mu_mean);
        }

        if !(rate > 0.0 && rate.is_finite()) {
            warn!("Noise precision rate degenerated to {}", rate);
            return Err(VbpcaError::degenerate(Factor::Noise, Degeneracy::InvalidRate(rate)));
        }

        trace!("noise update: rate {:.6e}", rate);
        self.posterior.gamma_a =
            prior.gamma_shape + 0.5 * (self.n_observations * self.n_features) as f64;
        self.posterior.gamma_b = rate;
        Ok(())
    }

    fn invert(&self, matrix: &Array2<f64>, factor: Factor) -> Result<Array2<f64>, VbpcaError> {
        matrix
            .spd_inverse(self.condition_threshold)
            .map_err(|cause| {
                warn!("Refusing to invert {} precision: {}", factor, cause);
                VbpcaError::degenerate(factor, cause)
            })
    }

    fn mu_column(&self) -> ArrayView2<'_, f64> {
        self.posterior.mu_mean.view().insert_axis(Axis(1))
    }

    fn centered(&self, y: ArrayView2<f64>) -> Array2<f64> {
        &y - &self.mu_column()
    }
}

fn check_observations(y: &Array2<f64>) -> Result<(usize, usize), VbpcaError> {
    let (n_features, n_observations) = y.dim();
    if n_features < 2 {
        return Err(VbpcaError::InvalidShape(format!(
            "observations need at least 2 dimensions, got {}",
            n_features
        )));
    }
    if n_observations < 1 {
        return Err(VbpcaError::InvalidShape(
            "at least one observation is required".to_string(),
        ));
    }
    if !y.all_finite() {
        return Err(VbpcaError::InvalidShape(
            "observations contain non-finite values".to_string(),
        ));
    }
    Ok((n_features, n_observations))
}

/// Builder for configuring and creating [`VBPCA`] instances.
///
/// # Example Usage
/// ```ignore
/// let mut vbpca = VBPCABuilder::new()
///     .gamma_prior(1e-3, 1e-3)
///     .random_seed(7)
///     .build(observations)?;
/// let latent = vbpca.fit_transform(100)?;
/// ```
#[derive(Debug, Clone)]
pub struct VBPCABuilder {
    hyperpriors: Hyperpriors,
    condition_threshold: f64,
    random_seed: u64,
    verbose: bool,
}

impl Default for VBPCABuilder {
    fn default() -> Self {
        Self {
            hyperpriors: Hyperpriors::default(),
            condition_threshold: 1e12,
            random_seed: 42,
            verbose: false,
        }
    }
}

impl VBPCABuilder {
    /// Creates a new builder with default parameters.
    ///
    /// Default values:
    /// - every hyperprior: 1.0
    /// - `condition_threshold`: 1e12
    /// - `random_seed`: 42
    /// - `verbose`: false
    pub fn new() -> Self {
        Self::default()
    }

    /// Gamma prior (shape, rate) on each relevance precision.
    pub fn alpha_prior(mut self, shape: f64, rate: f64) -> Self {
        self.hyperpriors.alpha_shape = shape;
        self.hyperpriors.alpha_rate = rate;
        self
    }

    /// Gamma prior (shape, rate) on the noise precision.
    pub fn gamma_prior(mut self, shape: f64, rate: f64) -> Self {
        self.hyperpriors.gamma_shape = shape;
        self.hyperpriors.gamma_rate = rate;
        self
    }

    /// Prior precision of the mean vector.
    pub fn beta(mut self, beta: f64) -> Self {
        self.hyperpriors.beta = beta;
        self
    }

    pub fn hyperpriors(mut self, hyperpriors: Hyperpriors) -> Self {
        self.hyperpriors = hyperpriors;
        self
    }

    /// Largest condition number accepted when inverting a precision matrix.
    ///
    /// Must be greater than one. `f64::INFINITY` only rejects matrices that are not
    /// positive-definite.
    pub fn condition_threshold(mut self, threshold: f64) -> Self {
        self.condition_threshold = threshold;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds the engine, initialising the posterior from a `ChaCha8Rng` seeded with
    /// `random_seed`.
    pub fn build(self, y: Array2<f64>) -> Result<VBPCA, VbpcaError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_seed);
        self.build_with_rng(y, &mut rng)
    }

    /// Builds the engine, drawing the initial posterior means from `rng`.
    pub fn build_with_rng<R: Rng + ?Sized>(
        self,
        y: Array2<f64>,
        rng: &mut R,
    ) -> Result<VBPCA, VbpcaError> {
        self.hyperpriors.validate()?;
        if !(self.condition_threshold > 1.0) {
            return Err(VbpcaError::InvalidConfig(format!(
                "condition threshold must be greater than 1, got {}",
                self.condition_threshold
            )));
        }
        VBPCA::from_parts(
            y,
            self.hyperpriors,
            self.condition_threshold,
            self.verbose,
            rng,
        )
    }
}
