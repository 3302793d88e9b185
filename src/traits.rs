//! # Traits
//!
//! $$
//! X_i\sim F_i,\qquad X=(X_1,\dots,X_d)\sim F
//! $$
//!
//! Capability contracts of the per-component distributions consumed by a joint
//! distribution, and of the multivariate generators a Sklar-wrapped dependence
//! structure is built from.
//!
use std::fmt::Debug;
use std::sync::Arc;

use ndarray::Array1;
use ndarray::Array2;
use rand::Rng;
use rand::RngCore;

use crate::error::Result;
use crate::linalg::central_difference;
use crate::standard::normal_cdf;
use crate::standard::normal_pdf;
use crate::standard::normal_quantile;

/// Elliptical family shared by a copula and (possibly) its marginals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EllipticalFamily {
  Normal,
  Student { nu: f64 },
}

/// Support of a one-dimensional distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
  pub lower: f64,
  pub upper: f64,
}

impl Interval {
  pub fn new(lower: f64, upper: f64) -> Self {
    Self { lower, upper }
  }

  pub fn real_line() -> Self {
    Self::new(f64::NEG_INFINITY, f64::INFINITY)
  }

  pub fn is_finite_lower(&self) -> bool {
    self.lower.is_finite()
  }

  pub fn is_finite_upper(&self) -> bool {
    self.upper.is_finite()
  }

  pub fn contains(&self, x: f64) -> bool {
    self.lower <= x && x <= self.upper
  }
}

/// Per-component distribution of dimension one.
///
/// Values are immutable: `with_parameters` yields a new distribution.
pub trait UnivariateExt: Debug + Send + Sync {
  fn dimension(&self) -> usize {
    1
  }

  fn pdf(&self, x: f64) -> f64;

  fn log_pdf(&self, x: f64) -> f64 {
    self.pdf(x).ln()
  }

  fn cdf(&self, x: f64) -> f64;

  fn sf(&self, x: f64) -> f64 {
    1.0 - self.cdf(x)
  }

  /// Right-continuous generalized inverse of the CDF, `p` in [0, 1].
  fn quantile(&self, p: f64) -> f64;

  fn sample(&self, rng: &mut dyn RngCore) -> f64 {
    self.quantile(rng.gen::<f64>())
  }

  fn range(&self) -> Interval;

  fn mean(&self) -> f64;

  fn std_dev(&self) -> f64;

  fn variance(&self) -> f64 {
    self.std_dev().powi(2)
  }

  fn parameters(&self) -> Vec<f64>;

  fn parameter_names(&self) -> Vec<String>;

  fn with_parameters(&self, parameters: &[f64]) -> Result<Arc<dyn UnivariateExt>>;

  fn description(&self) -> String;

  fn elliptical_family(&self) -> Option<EllipticalFamily> {
    None
  }

  /// Location and scale of an elliptical marginal.
  fn location_scale(&self) -> Option<(f64, f64)> {
    None
  }

  /// True when two calls with the same generator state may differ
  /// (disables parallel batch sampling).
  fn is_stateful(&self) -> bool {
    false
  }

  /// Map to the standard normal space.
  fn to_standard(&self, x: f64) -> f64 {
    normal_quantile(self.cdf(x))
  }

  fn from_standard(&self, z: f64) -> f64 {
    self.quantile(normal_cdf(z))
  }

  fn to_standard_derivative(&self, x: f64) -> f64 {
    self.pdf(x) / normal_pdf(self.to_standard(x))
  }

  /// Gradient of the PDF at `x` with respect to `parameters()`.
  fn pdf_gradient(&self, x: f64) -> Result<Array1<f64>> {
    central_difference(&self.parameters(), 1e-6, |p| {
      Ok(self.with_parameters(p)?.pdf(x))
    })
  }

  /// Gradient of the CDF at `x` with respect to `parameters()`.
  fn cdf_gradient(&self, x: f64) -> Result<Array1<f64>> {
    central_difference(&self.parameters(), 1e-6, |p| {
      Ok(self.with_parameters(p)?.cdf(x))
    })
  }
}

/// Multivariate generator from which a dependence structure can be extracted.
pub trait MultivariateExt: Debug + Send + Sync {
  fn dimension(&self) -> usize;

  fn pdf(&self, x: &Array1<f64>) -> Result<f64>;

  fn cdf(&self, x: &Array1<f64>) -> Result<f64>;

  fn marginal_component(&self, i: usize) -> Result<Arc<dyn UnivariateExt>>;

  fn marginal_distribution(&self, indices: &[usize]) -> Result<Arc<dyn MultivariateExt>>;

  /// Density of component `y.len()` given the preceding components `y`.
  fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64>;

  fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64>;

  fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64>;

  fn sample(&self, n: usize) -> Result<Array2<f64>>;

  fn has_independent_copula(&self) -> bool {
    false
  }

  /// Family and shape matrix when the dependence is an elliptical copula.
  fn elliptical_copula(&self) -> Option<(EllipticalFamily, Array2<f64>)> {
    None
  }
}
