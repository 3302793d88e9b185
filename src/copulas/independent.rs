//! # Independent
//!
//! $$
//! \Pi(u)=\prod_{i=1}^d u_i,\qquad \pi(u)=\mathbf 1_{[0,1]^d}(u)
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::error::invalid;
use crate::error::Result;
use crate::standard::normal_cdf;
use crate::standard::normal_quantile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndependentCopula {
  dimension: usize,
}

impl IndependentCopula {
  pub fn new(dimension: usize) -> Result<Self> {
    if dimension == 0 {
      return invalid("independent copula needs a positive dimension");
    }
    Ok(Self { dimension })
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }

  pub fn pdf(&self, u: &Array1<f64>) -> f64 {
    if u.iter().all(|&v| (0.0..=1.0).contains(&v)) {
      1.0
    } else {
      0.0
    }
  }

  pub fn cdf(&self, u: &Array1<f64>) -> f64 {
    u.iter().map(|&v| v.clamp(0.0, 1.0)).product()
  }

  pub fn conditional_pdf(&self, x: f64) -> f64 {
    if (0.0..=1.0).contains(&x) {
      1.0
    } else {
      0.0
    }
  }

  pub fn conditional_cdf(&self, x: f64) -> f64 {
    x.clamp(0.0, 1.0)
  }

  pub fn conditional_quantile(&self, q: f64) -> f64 {
    q.clamp(0.0, 1.0)
  }

  pub fn sample(&self, n: usize) -> Array2<f64> {
    Array2::random((n, self.dimension), Uniform::new(0.0, 1.0))
  }

  /// `u` with `Π(u) = p` on the diagonal.
  pub fn scalar_quantile(&self, p: f64) -> Array1<f64> {
    Array1::from_elem(self.dimension, p.powf(1.0 / self.dimension as f64))
  }

  pub fn transform(&self, u: &Array1<f64>) -> Array1<f64> {
    u.mapv(normal_quantile)
  }

  pub fn inverse_transform(&self, z: &Array1<f64>) -> Array1<f64> {
    z.mapv(normal_cdf)
  }

  pub fn kendall_tau(&self) -> Array2<f64> {
    Array2::eye(self.dimension)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn unit_density_inside_the_cube() {
    let c = IndependentCopula::new(3).unwrap();
    assert_eq!(c.pdf(&array![0.2, 0.5, 0.9]), 1.0);
    assert_eq!(c.pdf(&array![0.2, 1.5, 0.9]), 0.0);
    assert_abs_diff_eq!(c.cdf(&array![0.5, 0.5, 2.0]), 0.25);
  }

  #[test]
  fn conditional_cdf_ignores_the_conditioning_point() {
    let c = IndependentCopula::new(2).unwrap();
    assert_eq!(c.conditional_cdf(0.3), 0.3);
    assert_eq!(c.conditional_cdf(-0.3), 0.0);
    assert_eq!(c.conditional_cdf(1.3), 1.0);
  }

  #[test]
  fn samples_stay_in_the_cube() {
    let c = IndependentCopula::new(4).unwrap();
    let s = c.sample(500);
    assert_eq!(s.dim(), (500, 4));
    assert!(s.iter().all(|&v| (0.0..1.0).contains(&v)));
  }

  #[test]
  fn zero_dimension_is_rejected() {
    assert!(IndependentCopula::new(0).unwrap_err().is_invalid_argument());
  }
}
