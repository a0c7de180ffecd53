//! # Dimensionality Reduction
//!
//! This module provides probabilistic models for reducing the dimensionality of dense data while
//! estimating how many latent dimensions the data actually supports.
//!
//! ## Currently Available
//! - **VBPCA** ([`vbpca`]): Variational Bayesian PCA with automatic relevance determination
//!
//! ## Algorithm Selection Guide
//! - Use **VBPCA** when the number of components is unknown and a noise estimate is wanted
//! - The caller controls the number of sweeps; the latent dimensionality is fixed at `D - 1` and
//!   unneeded components are pruned by their relevance precisions

pub mod vbpca;
