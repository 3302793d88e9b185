//! # Normal
//!
//! $$
//! f(x)=\frac{1}{\sigma\sqrt{2\pi}}\exp\!\left(-\frac{(x-\mu)^2}{2\sigma^2}\right)
//! $$
//!
use std::sync::Arc;

use ndarray::array;
use ndarray::Array1;
use rand::Rng;
use rand::RngCore;
use rand_distr::StandardNormal;
use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;

use super::check_parameter_count;
use super::DEFAULT_DESCRIPTION;
use crate::error::Error;
use crate::error::Result;
use crate::standard::normal_quantile;
use crate::traits::EllipticalFamily;
use crate::traits::Interval;
use crate::traits::UnivariateExt;

#[derive(Debug, Clone)]
pub struct Normal {
  mu: f64,
  sigma: f64,
  dist: statrs::distribution::Normal,
  description: String,
}

impl Normal {
  pub fn new(mu: f64, sigma: f64) -> Result<Self> {
    if !(sigma > 0.0) || !mu.is_finite() {
      return Err(Error::InvalidArgument(format!(
        "Normal requires a finite mean and sigma > 0, got mu={mu}, sigma={sigma}"
      )));
    }
    let dist = statrs::distribution::Normal::new(mu, sigma)
      .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    Ok(Self {
      mu,
      sigma,
      dist,
      description: DEFAULT_DESCRIPTION.into(),
    })
  }

  pub fn with_description(mut self, description: &str) -> Self {
    self.description = description.into();
    self
  }
}

impl UnivariateExt for Normal {
  fn pdf(&self, x: f64) -> f64 {
    self.dist.pdf(x)
  }

  fn log_pdf(&self, x: f64) -> f64 {
    self.dist.ln_pdf(x)
  }

  fn cdf(&self, x: f64) -> f64 {
    self.dist.cdf(x)
  }

  fn sf(&self, x: f64) -> f64 {
    self.dist.sf(x)
  }

  fn quantile(&self, p: f64) -> f64 {
    self.mu + self.sigma * normal_quantile(p)
  }

  fn sample(&self, rng: &mut dyn RngCore) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    self.mu + self.sigma * z
  }

  fn range(&self) -> Interval {
    Interval::real_line()
  }

  fn mean(&self) -> f64 {
    self.mu
  }

  fn std_dev(&self) -> f64 {
    self.sigma
  }

  fn parameters(&self) -> Vec<f64> {
    vec![self.mu, self.sigma]
  }

  fn parameter_names(&self) -> Vec<String> {
    vec!["mu".into(), "sigma".into()]
  }

  fn with_parameters(&self, parameters: &[f64]) -> Result<Arc<dyn UnivariateExt>> {
    check_parameter_count(2, parameters)?;
    Ok(Arc::new(
      Normal::new(parameters[0], parameters[1])?.with_description(&self.description),
    ))
  }

  fn description(&self) -> String {
    self.description.clone()
  }

  fn elliptical_family(&self) -> Option<EllipticalFamily> {
    Some(EllipticalFamily::Normal)
  }

  fn location_scale(&self) -> Option<(f64, f64)> {
    Some((self.mu, self.sigma))
  }

  fn to_standard(&self, x: f64) -> f64 {
    (x - self.mu) / self.sigma
  }

  fn from_standard(&self, z: f64) -> f64 {
    self.mu + self.sigma * z
  }

  fn to_standard_derivative(&self, _x: f64) -> f64 {
    1.0 / self.sigma
  }

  fn pdf_gradient(&self, x: f64) -> Result<Array1<f64>> {
    let pdf = self.pdf(x);
    let z = (x - self.mu) / self.sigma;
    Ok(array![
      pdf * z / self.sigma,
      pdf * (z * z - 1.0) / self.sigma
    ])
  }

  fn cdf_gradient(&self, x: f64) -> Result<Array1<f64>> {
    let pdf = self.pdf(x);
    let z = (x - self.mu) / self.sigma;
    Ok(array![-pdf, -pdf * z])
  }
}
