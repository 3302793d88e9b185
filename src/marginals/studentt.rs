//! # Student-t
//!
//! $$
//! f(x)=\frac{\Gamma\left(\frac{\nu+1}{2}\right)}{\sigma\sqrt{\nu\pi}\,\Gamma\left(\frac{\nu}{2}\right)}
//! \left(1+\frac{(x-\mu)^2}{\nu\sigma^2}\right)^{-\frac{\nu+1}{2}}
//! $$
//!
use std::sync::Arc;

use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;

use super::check_parameter_count;
use super::DEFAULT_DESCRIPTION;
use crate::error::Error;
use crate::error::Result;
use crate::traits::EllipticalFamily;
use crate::traits::Interval;
use crate::traits::UnivariateExt;

#[derive(Debug, Clone)]
pub struct StudentT {
  nu: f64,
  mu: f64,
  sigma: f64,
  dist: statrs::distribution::StudentsT,
  description: String,
}

impl StudentT {
  pub fn new(nu: f64, mu: f64, sigma: f64) -> Result<Self> {
    if !(nu > 0.0) || !(sigma > 0.0) || !mu.is_finite() {
      return Err(Error::InvalidArgument(format!(
        "StudentT requires nu > 0 and sigma > 0, got nu={nu}, mu={mu}, sigma={sigma}"
      )));
    }
    let dist = statrs::distribution::StudentsT::new(mu, sigma, nu)
      .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    Ok(Self {
      nu,
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

  pub fn nu(&self) -> f64 {
    self.nu
  }
}

impl UnivariateExt for StudentT {
  fn pdf(&self, x: f64) -> f64 {
    self.dist.pdf(x)
  }

  fn log_pdf(&self, x: f64) -> f64 {
    self.dist.ln_pdf(x)
  }

  fn cdf(&self, x: f64) -> f64 {
    self.dist.cdf(x)
  }

  fn quantile(&self, p: f64) -> f64 {
    if p <= 0.0 {
      return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
      return f64::INFINITY;
    }
    self.dist.inverse_cdf(p)
  }

  fn range(&self) -> Interval {
    Interval::real_line()
  }

  fn mean(&self) -> f64 {
    if self.nu > 1.0 {
      self.mu
    } else {
      f64::NAN
    }
  }

  fn std_dev(&self) -> f64 {
    if self.nu > 2.0 {
      self.sigma * (self.nu / (self.nu - 2.0)).sqrt()
    } else {
      f64::INFINITY
    }
  }

  fn parameters(&self) -> Vec<f64> {
    vec![self.nu, self.mu, self.sigma]
  }

  fn parameter_names(&self) -> Vec<String> {
    vec!["nu".into(), "mu".into(), "sigma".into()]
  }

  fn with_parameters(&self, parameters: &[f64]) -> Result<Arc<dyn UnivariateExt>> {
    check_parameter_count(3, parameters)?;
    Ok(Arc::new(
      StudentT::new(parameters[0], parameters[1], parameters[2])?
        .with_description(&self.description),
    ))
  }

  fn description(&self) -> String {
    self.description.clone()
  }

  fn elliptical_family(&self) -> Option<EllipticalFamily> {
    Some(EllipticalFamily::Student { nu: self.nu })
  }

  fn location_scale(&self) -> Option<(f64, f64)> {
    Some((self.mu, self.sigma))
  }
}
