//! # Correlation
//!
//! $$
//! R_{ij}=\sin\!\left(\frac{\pi}{2}\tau_{ij}\right)=2\sin\!\left(\frac{\pi}{6}\rho^S_{ij}\right)
//! $$
//!
use std::cmp::Ordering;
use std::f64::consts::PI;

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::warn;

use super::elliptical::EllipticalCopula;
use super::Core;
use crate::error::Error;
use crate::error::Result;
use crate::linalg::is_positive_definite;

/// Kendall's tau matrix of the columns of `data`.
pub fn kendall_tau(data: &Array2<f64>) -> Result<Array2<f64>> {
  let cols = data.ncols();
  let mut tau_matrix = Array2::<f64>::eye(cols);

  for i in 0..cols {
    for j in (i + 1)..cols {
      let (tau, ..) = kendalls::tau_b_with_comparator(
        &data.column(i).to_vec(),
        &data.column(j).to_vec(),
        |a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(Ordering::Greater),
      )
      .map_err(|e| Error::InvalidArgument(format!("Kendall tau of columns {i}, {j}: {e}")))?;
      tau_matrix[[i, j]] = tau;
      tau_matrix[[j, i]] = tau;
    }
  }

  Ok(tau_matrix)
}

fn ranks(column: ArrayView1<f64>) -> Vec<f64> {
  let n = column.len();
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| column[a].partial_cmp(&column[b]).unwrap_or(Ordering::Equal));
  let mut ranks = vec![0.0; n];
  let mut start = 0;
  while start < n {
    let mut end = start + 1;
    while end < n && column[order[end]] == column[order[start]] {
      end += 1;
    }
    // Ties share the average rank.
    let rank = 0.5 * (start + end - 1) as f64 + 1.0;
    for &k in &order[start..end] {
      ranks[k] = rank;
    }
    start = end;
  }
  ranks
}

/// Spearman's rho matrix: Pearson correlation of the column ranks.
pub fn spearman_rho(data: &Array2<f64>) -> Result<Array2<f64>> {
  let (n, cols) = data.dim();
  let mut ranked = Array2::<f64>::zeros((cols, n));
  for (j, column) in data.axis_iter(Axis(1)).enumerate() {
    ranked
      .row_mut(j)
      .assign(&ArrayView1::from(&ranks(column)));
  }
  ranked
    .pearson_correlation()
    .map_err(|e| Error::InvalidArgument(format!("Spearman rho: {e}")))
}

/// Normal copula whose correlation is rebuilt from the rank statistics of
/// `data`, through Kendall's tau first and Spearman's rho when the former
/// does not give a positive definite matrix.
pub fn normal_copula_from_sample(data: &Array2<f64>) -> Result<Core> {
  if data.nrows() < 2 {
    return Err(Error::InvalidArgument(
      "need at least two observations to estimate a correlation".into(),
    ));
  }

  let mut r = kendall_tau(data)?.mapv(|t| (0.5 * PI * t).sin());
  if !is_positive_definite(&r) {
    warn!("correlation from Kendall tau is not positive definite, using Spearman rho");
    r = spearman_rho(data)?.mapv(|s| 2.0 * (PI * s / 6.0).sin());
  }
  for i in 0..r.nrows() {
    r[[i, i]] = 1.0;
  }
  if !is_positive_definite(&r) {
    return Err(Error::InvalidCorrelation(
      "correlation rebuilt from ranks is not positive definite".into(),
    ));
  }
  Ok(Core::Elliptical(EllipticalCopula::normal(r)?))
}
