//! # Standard
//!
//! $$
//! \Phi(z)=\tfrac12\operatorname{erfc}\!\left(-z/\sqrt2\right),\qquad
//! \Phi^{-1}(p)=-\sqrt2\,\operatorname{erfc}^{-1}(2p)
//! $$
//!
//! Standard normal kernel shared by the elliptical copula, the per-component
//! maps to the standard space and the Rosenblatt transform.
//!
use std::f64::consts::PI;
use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;
use statrs::function::erf::erfc_inv;

pub fn normal_pdf(z: f64) -> f64 {
  (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

pub fn normal_log_pdf(z: f64) -> f64 {
  -0.5 * z * z - 0.5 * (2.0 * PI).ln()
}

pub fn normal_cdf(z: f64) -> f64 {
  if z == f64::INFINITY {
    return 1.0;
  }
  if z == f64::NEG_INFINITY {
    return 0.0;
  }
  0.5 * erfc(-z / SQRT_2)
}

/// Right-continuous inverse; returns the infinities at 0 and 1.
pub fn normal_quantile(p: f64) -> f64 {
  if p <= 0.0 {
    return f64::NEG_INFINITY;
  }
  if p >= 1.0 {
    return f64::INFINITY;
  }
  -SQRT_2 * erfc_inv(2.0 * p)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn quantile_inverts_cdf() {
    for &z in &[-5.0, -1.3, 0.0, 0.25, 2.7] {
      assert_abs_diff_eq!(normal_quantile(normal_cdf(z)), z, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(normal_cdf(1.959963984540054), 0.975, epsilon = 1e-10);
  }

  #[test]
  fn boundaries_map_to_infinities() {
    assert_eq!(normal_quantile(0.0), f64::NEG_INFINITY);
    assert_eq!(normal_quantile(1.0), f64::INFINITY);
    assert_eq!(normal_cdf(f64::INFINITY), 1.0);
  }
}
