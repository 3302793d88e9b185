//! # Config
//!
//! $$
//! N_{\text{cov}},\ n_{\text{GL}},\ h_{\text{FD}},\ \varepsilon_{\text{root}}
//! $$
//!
use impl_new_derive::ImplNew;

/// Gauss-Legendre nodes used to integrate a conditional density into a conditional CDF.
pub const CONDITIONAL_INTEGRATION_NODES: usize = 64;

/// Gauss-Legendre nodes per hidden coordinate when a marginal density is integrated out.
pub const MARGINAL_INTEGRATION_NODES: usize = 16;

/// Gauss-Legendre nodes of the angle (Normal) and tail-mapped (Student) rules for bivariate elliptical CDFs.
pub const ELLIPTICAL_CDF_NODES: usize = 96;

/// Lattice points of the separation-of-variables rule for elliptical CDFs in dimension > 2.
pub const ELLIPTICAL_CDF_LATTICE_POINTS: usize = 8192;

/// Largest dimension for which survival and box probabilities expand over the
/// `2^d` vertices of the box. Independent joints are not limited.
pub const MAX_INCLUSION_EXCLUSION_DIMENSION: usize = 20;

pub const ROOT_TOLERANCE: f64 = 1e-13;

pub const ROOT_MAX_ITERATIONS: usize = 200;

/// Knobs carried by each joint distribution.
#[derive(Debug, Clone, Copy, PartialEq, ImplNew)]
pub struct Settings {
  /// Integration budget N of the covariance quadrature: ceil(sqrt(N)) nodes per axis.
  pub covariance_integration_nodes: usize,
  /// Below this sample size batch sampling stays on the calling thread.
  pub parallel_sampling_threshold: usize,
  /// Rows generated by one worker in a parallel batch.
  pub sampling_chunk_size: usize,
  /// Relative step of the central finite differences.
  pub finite_difference_step: f64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      covariance_integration_nodes: 2500,
      parallel_sampling_threshold: 4096,
      sampling_chunk_size: 1024,
      finite_difference_step: 1e-5,
    }
  }
}

impl Settings {
  /// Nodes per axis of the covariance product rule.
  pub fn covariance_nodes_per_axis(&self) -> usize {
    (self.covariance_integration_nodes as f64).sqrt().ceil().max(1.0) as usize
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn nodes_per_axis_rounds_up() {
    let mut settings = Settings::default();
    assert_eq!(settings.covariance_nodes_per_axis(), 50);
    settings.covariance_integration_nodes = 2501;
    assert_eq!(settings.covariance_nodes_per_axis(), 51);
    let custom = Settings::new(10, 1, 1, 1e-4);
    assert_eq!(custom.covariance_nodes_per_axis(), 4);
  }
}
