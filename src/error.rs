//! # Error
//!
//! $$
//! \text{op}:\ \text{inputs}\to\text{Result}\langle T,\ \text{Error}\rangle
//! $$
//!
use thiserror::Error;

/// Errors raised by joint distributions, dependence structures and transforms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
  /// Dimension mismatch, probability outside [0, 1], empty component list, ...
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  /// Correlation or shape matrix that is not a symmetric positive definite
  /// unit-diagonal matrix.
  #[error("Invalid correlation: {0}")]
  InvalidCorrelation(String),

  /// Capability with no closed form for this dependence structure.
  #[error("Not yet implemented: {0}")]
  NotYetImplemented(String),

  /// Failure reported by a numerical collaborator (root finder, quadrature rule).
  #[error("Numerical error: {0}")]
  Numerical(String),
}

impl Error {
  /// True for every variant describing a bad caller-supplied argument.
  pub fn is_invalid_argument(&self) -> bool {
    matches!(self, Error::InvalidArgument(_) | Error::InvalidCorrelation(_))
  }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
  Err(Error::InvalidArgument(msg.into()))
}

pub(crate) fn check_dimension(expected: usize, got: usize, what: &str) -> Result<()> {
  if expected != got {
    return invalid(format!(
      "{what} has dimension {got}, expected {expected}"
    ));
  }
  Ok(())
}

pub(crate) fn check_probability(p: f64) -> Result<()> {
  if !(0.0..=1.0).contains(&p) {
    return invalid(format!("probability level {p} is outside [0, 1]"));
  }
  Ok(())
}
