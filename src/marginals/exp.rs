//! # Exponential
//!
//! $$
//! f(x)=\lambda e^{-\lambda x}\mathbf 1_{x\ge0}
//! $$
//!
use std::sync::Arc;

use rand::Rng;
use rand::RngCore;
use rand_distr::Exp1;
use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;

use super::check_parameter_count;
use super::DEFAULT_DESCRIPTION;
use crate::error::Error;
use crate::error::Result;
use crate::traits::Interval;
use crate::traits::UnivariateExt;

#[derive(Debug, Clone)]
pub struct Exponential {
  lambda: f64,
  dist: statrs::distribution::Exp,
  description: String,
}

impl Exponential {
  pub fn new(lambda: f64) -> Result<Self> {
    if !(lambda > 0.0) || !lambda.is_finite() {
      return Err(Error::InvalidArgument(format!(
        "Exponential requires lambda > 0, got {lambda}"
      )));
    }
    let dist =
      statrs::distribution::Exp::new(lambda).map_err(|e| Error::InvalidArgument(e.to_string()))?;
    Ok(Self {
      lambda,
      dist,
      description: DEFAULT_DESCRIPTION.into(),
    })
  }

  pub fn with_description(mut self, description: &str) -> Self {
    self.description = description.into();
    self
  }
}

impl UnivariateExt for Exponential {
  fn pdf(&self, x: f64) -> f64 {
    self.dist.pdf(x)
  }

  fn cdf(&self, x: f64) -> f64 {
    self.dist.cdf(x)
  }

  fn sf(&self, x: f64) -> f64 {
    self.dist.sf(x)
  }

  fn quantile(&self, p: f64) -> f64 {
    if p >= 1.0 {
      return f64::INFINITY;
    }
    -(-p.max(0.0)).ln_1p() / self.lambda
  }

  fn sample(&self, rng: &mut dyn RngCore) -> f64 {
    let e: f64 = rng.sample(Exp1);
    e / self.lambda
  }

  fn range(&self) -> Interval {
    Interval::new(0.0, f64::INFINITY)
  }

  fn mean(&self) -> f64 {
    1.0 / self.lambda
  }

  fn std_dev(&self) -> f64 {
    1.0 / self.lambda
  }

  fn parameters(&self) -> Vec<f64> {
    vec![self.lambda]
  }

  fn parameter_names(&self) -> Vec<String> {
    vec!["lambda".into()]
  }

  fn with_parameters(&self, parameters: &[f64]) -> Result<Arc<dyn UnivariateExt>> {
    check_parameter_count(1, parameters)?;
    Ok(Arc::new(
      Exponential::new(parameters[0])?.with_description(&self.description),
    ))
  }

  fn description(&self) -> String {
    self.description.clone()
  }
}
