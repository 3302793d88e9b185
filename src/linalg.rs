//! # Linalg
//!
//! $$
//! R=LL^\top,\qquad w=L^{-1}z
//! $$
//!
use approx::abs_diff_eq;
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::Error;
use crate::error::Result;

pub(crate) fn to_nalgebra(a: &Array2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_nalgebra(m: &DMatrix<f64>) -> Array2<f64> {
  Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Checks that `corr` is a valid correlation matrix and returns its lower Cholesky factor.
pub fn correlation_cholesky(corr: &Array2<f64>) -> Result<Array2<f64>> {
  let d = corr.nrows();
  if d == 0 || d != corr.ncols() {
    return Err(Error::InvalidCorrelation(format!(
      "correlation matrix must be square and non-empty, got {}x{}",
      corr.nrows(),
      corr.ncols()
    )));
  }
  for i in 0..d {
    if !abs_diff_eq!(corr[[i, i]], 1.0, epsilon = 1e-12) {
      return Err(Error::InvalidCorrelation(format!(
        "diagonal entry {i} is {}, expected 1",
        corr[[i, i]]
      )));
    }
    for j in 0..i {
      if !abs_diff_eq!(corr[[i, j]], corr[[j, i]], epsilon = 1e-12) {
        return Err(Error::InvalidCorrelation(format!(
          "matrix is not symmetric at ({i}, {j})"
        )));
      }
    }
  }
  cholesky_lower(corr)
}

/// Smallest pivot accepted as nonzero by `cholesky_lower`.
const PIVOT_FLOOR: f64 = 1e-7;

pub fn cholesky_lower(a: &Array2<f64>) -> Result<Array2<f64>> {
  let l = to_nalgebra(a)
    .cholesky()
    .map(|chol| chol.l())
    .filter(|l| l.diagonal().iter().all(|&p| p > PIVOT_FLOOR))
    .ok_or_else(|| Error::InvalidCorrelation("matrix is not positive definite".into()))?;
  Ok(from_nalgebra(&l))
}

pub fn is_positive_definite(a: &Array2<f64>) -> bool {
  a.nrows() == a.ncols() && cholesky_lower(a).is_ok()
}

/// Solves L w = z for lower-triangular L, using only the first `z.len()` rows.
pub fn forward_substitution(l: &Array2<f64>, z: ArrayView1<f64>) -> Array1<f64> {
  let n = z.len();
  let mut w = Array1::<f64>::zeros(n);
  for i in 0..n {
    let mut acc = z[i];
    for j in 0..i {
      acc -= l[[i, j]] * w[j];
    }
    w[i] = acc / l[[i, i]];
  }
  w
}

pub fn lower_triangular_inverse(l: &Array2<f64>) -> Result<Array2<f64>> {
  let inv = to_nalgebra(l)
    .try_inverse()
    .ok_or_else(|| Error::Numerical("triangular factor is singular".into()))?;
  Ok(from_nalgebra(&inv))
}

/// Central finite-difference gradient of `f` at `x` with relative step `h`.
pub fn central_difference<F>(x: &[f64], h: f64, f: F) -> Result<Array1<f64>>
where
  F: Fn(&[f64]) -> Result<f64>,
{
  let mut grad = Array1::<f64>::zeros(x.len());
  let mut point = x.to_vec();
  for k in 0..x.len() {
    let step = h * x[k].abs().max(1.0);
    point[k] = x[k] + step;
    let fp = f(&point)?;
    point[k] = x[k] - step;
    let fm = f(&point)?;
    point[k] = x[k];
    grad[k] = (fp - fm) / (2.0 * step);
  }
  Ok(grad)
}

/// Sub-matrix on the given rows and columns.
pub fn select(a: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
  Array2::from_shape_fn((indices.len(), indices.len()), |(i, j)| {
    a[[indices[i], indices[j]]]
  })
}
