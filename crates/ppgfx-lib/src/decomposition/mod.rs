//! Multi-component waveform models, their least-squares fitters and the
//! indices derived from fitted parameters.

pub mod fit;
pub mod indices;
pub mod mixture;
pub mod numeric;

pub use fit::{
    fit_gaussians, fit_mixture, fit_skewed, FitReport, GaussianFitter, GaussianModel,
    GuessScaling, MixtureModel, SkewedFitter, SkewedModel, SolverConfig,
};
pub use indices::GaussianIndices;
pub use mixture::{
    GaussianComponent, GaussianMixture, SkewForm, SkewedComponent, SkewedMixture, COMPONENTS,
};
