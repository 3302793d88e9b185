//! # Uniform
//!
//! $$
//! f(x)=\frac{1}{b-a}\mathbf 1_{[a,b]}(x)
//! $$
//!
use std::sync::Arc;

use rand::Rng;
use rand::RngCore;
use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;

use super::check_parameter_count;
use super::DEFAULT_DESCRIPTION;
use crate::error::Error;
use crate::error::Result;
use crate::traits::Interval;
use crate::traits::UnivariateExt;

#[derive(Debug, Clone)]
pub struct Uniform {
  a: f64,
  b: f64,
  dist: statrs::distribution::Uniform,
  description: String,
}

impl Uniform {
  pub fn new(a: f64, b: f64) -> Result<Self> {
    if !(a < b) || !a.is_finite() || !b.is_finite() {
      return Err(Error::InvalidArgument(format!(
        "Uniform requires finite bounds a < b, got a={a}, b={b}"
      )));
    }
    let dist = statrs::distribution::Uniform::new(a, b)
      .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    Ok(Self {
      a,
      b,
      dist,
      description: DEFAULT_DESCRIPTION.into(),
    })
  }

  pub fn with_description(mut self, description: &str) -> Self {
    self.description = description.into();
    self
  }
}

impl UnivariateExt for Uniform {
  fn pdf(&self, x: f64) -> f64 {
    self.dist.pdf(x)
  }

  fn cdf(&self, x: f64) -> f64 {
    self.dist.cdf(x)
  }

  fn quantile(&self, p: f64) -> f64 {
    self.a + p.clamp(0.0, 1.0) * (self.b - self.a)
  }

  fn sample(&self, rng: &mut dyn RngCore) -> f64 {
    rng.gen_range(self.a..self.b)
  }

  fn range(&self) -> Interval {
    Interval::new(self.a, self.b)
  }

  fn mean(&self) -> f64 {
    0.5 * (self.a + self.b)
  }

  fn std_dev(&self) -> f64 {
    (self.b - self.a) / 12f64.sqrt()
  }

  fn parameters(&self) -> Vec<f64> {
    vec![self.a, self.b]
  }

  fn parameter_names(&self) -> Vec<String> {
    vec!["a".into(), "b".into()]
  }

  fn with_parameters(&self, parameters: &[f64]) -> Result<Arc<dyn UnivariateExt>> {
    check_parameter_count(2, parameters)?;
    Ok(Arc::new(
      Uniform::new(parameters[0], parameters[1])?.with_description(&self.description),
    ))
  }

  fn description(&self) -> String {
    self.description.clone()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn moments_and_quantiles() {
    let u = Uniform::new(-1.0, 3.0).unwrap();
    assert_abs_diff_eq!(u.mean(), 1.0);
    assert_abs_diff_eq!(u.variance(), 16.0 / 12.0, epsilon = 1e-14);
    assert_abs_diff_eq!(u.quantile(0.25), 0.0);
    assert_abs_diff_eq!(u.cdf(0.0), 0.25, epsilon = 1e-15);
    assert!(u.range().is_finite_lower() && u.range().is_finite_upper());
  }

  #[test]
  fn cdf_gradient_inside_support() {
    let u = Uniform::new(0.0, 2.0).unwrap();
    let g = u.cdf_gradient(0.5).unwrap();
    assert_abs_diff_eq!(g[0], (0.5 - 2.0) / 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(g[1], -0.5 / 4.0, epsilon = 1e-6);
  }
}
