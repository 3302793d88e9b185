//! # Marginals
//!
//! $$
//! F_i:\mathbb R\to[0,1]
//! $$
//!
//! Per-component distributions backed by `statrs`.
//!
pub mod exp;
pub mod normal;
pub mod studentt;
pub mod uniform;

pub use exp::Exponential;
pub use normal::Normal;
pub use studentt::StudentT;
pub use uniform::Uniform;

const DEFAULT_DESCRIPTION: &str = "X0";

fn check_parameter_count(expected: usize, parameters: &[f64]) -> crate::error::Result<()> {
  crate::error::check_dimension(expected, parameters.len(), "parameter vector")
}
