//! # Conditional
//!
//! $$
//! c_{i\mid <i}(x\mid y)=\frac{c_{0..i}(y,x)}{c_{0..i-1}(y)},\qquad
//! C_{i\mid <i}(x\mid y)=\int_0^x c_{i\mid <i}(t\mid y)\,dt
//! $$
//!
//! Generic conditional decomposition on the unit hypercube, used by the
//! dependence structures that have no closed-form conditional chain, and the
//! Brent inversions shared by every conditional quantile.
//!
use ndarray::Array1;
use roots::find_root_brent;
use roots::SimpleConvergency;

use crate::config::CONDITIONAL_INTEGRATION_NODES;
use crate::config::ROOT_MAX_ITERATIONS;
use crate::config::ROOT_TOLERANCE;
use crate::error::Error;
use crate::error::Result;
use crate::quadrature::unit_rule;

fn extend(y: &Array1<f64>, x: f64) -> Array1<f64> {
  let mut point = Array1::<f64>::zeros(y.len() + 1);
  point.slice_mut(ndarray::s![..y.len()]).assign(y);
  point[y.len()] = x;
  point
}

/// `prefix_pdf(p)` is the density of the first `p.len()` coordinates at `p`.
pub fn conditional_pdf_from_prefix<F>(x: f64, y: &Array1<f64>, prefix_pdf: F) -> Result<f64>
where
  F: Fn(&Array1<f64>) -> Result<f64>,
{
  if !(0.0..=1.0).contains(&x) {
    return Ok(0.0);
  }
  let denominator = if y.is_empty() { 1.0 } else { prefix_pdf(y)? };
  if denominator <= 0.0 {
    return Ok(0.0);
  }
  Ok(prefix_pdf(&extend(y, x))? / denominator)
}

pub fn conditional_cdf_from_prefix<F>(x: f64, y: &Array1<f64>, prefix_pdf: F) -> Result<f64>
where
  F: Fn(&Array1<f64>) -> Result<f64>,
{
  if x <= 0.0 {
    return Ok(0.0);
  }
  if x >= 1.0 {
    return Ok(1.0);
  }
  let denominator = if y.is_empty() { 1.0 } else { prefix_pdf(y)? };
  if denominator <= 0.0 {
    return Ok(x);
  }
  let rule = unit_rule(CONDITIONAL_INTEGRATION_NODES)?;
  let mut point = extend(y, 0.0);
  let last = y.len();
  let numerator = rule.try_integrate(0.0, x, |t| {
    point[last] = t;
    prefix_pdf(&point)
  })?;
  Ok((numerator / denominator).clamp(0.0, 1.0))
}

/// Smallest `t` in [0, 1] with `cdf(t) >= q`, by Brent's method.
pub fn invert_unit_cdf<F>(q: f64, cdf: F) -> Result<f64>
where
  F: Fn(f64) -> Result<f64>,
{
  if q <= 0.0 {
    return Ok(0.0);
  }
  if q >= 1.0 {
    return Ok(1.0);
  }
  invert_monotone(q, 0.0, 1.0, cdf)
}

/// Solves `f(t) = q` for nondecreasing `f` bracketed by [lo, hi].
pub fn invert_monotone<F>(q: f64, lo: f64, hi: f64, f: F) -> Result<f64>
where
  F: Fn(f64) -> Result<f64>,
{
  let mut failure: Option<Error> = None;
  let mut convergency = SimpleConvergency {
    eps: ROOT_TOLERANCE,
    max_iter: ROOT_MAX_ITERATIONS,
  };
  let root = find_root_brent(
    lo,
    hi,
    |t: f64| match f(t) {
      Ok(v) => v - q,
      Err(e) => {
        failure.get_or_insert(e);
        f64::NAN
      }
    },
    &mut convergency,
  );
  if let Some(e) = failure {
    return Err(e);
  }
  root.map_err(|e| Error::Numerical(format!("root search for level {q} failed: {e}")))
}

/// Diagonal quantile: `u = (t, ..., t)` with `cdf(u) = p`.
pub fn diagonal_quantile<F>(p: f64, dimension: usize, cdf: F) -> Result<Array1<f64>>
where
  F: Fn(&Array1<f64>) -> Result<f64>,
{
  crate::error::check_probability(p)?;
  let t = invert_unit_cdf(p, |t| cdf(&Array1::from_elem(dimension, t)))?;
  Ok(Array1::from_elem(dimension, t))
}
