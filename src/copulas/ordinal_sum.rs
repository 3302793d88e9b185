//! # Ordinal sum
//!
//! $$
//! C(u)=\begin{cases}
//! b_k+\ell_k\,C_k\!\left(\dfrac{\min(u,b_{k+1})-b_k}{\ell_k}\right), & \min(u)\in[b_k,b_{k+1}]\\[4pt]
//! \min(u), & \text{otherwise}
//! \end{cases}\qquad \ell_k=b_{k+1}-b_k
//! $$
//!
//! Sub-structures rescaled onto the diagonal hypercubes `[b_k, b_{k+1}]^d`.
//! The mass outside those hypercubes is zero.
//!
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use rand::Rng;
use tracing::warn;

use super::Core;
use crate::error::check_dimension;
use crate::error::invalid;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct OrdinalSumCopula {
  /// `0 = b_0 < b_1 < ... < b_n = 1`, one more entry than `blocks`.
  bounds: Vec<f64>,
  blocks: Vec<Core>,
}

impl OrdinalSumCopula {
  /// `interior` holds `b_1, ..., b_{n-1}` for `n` blocks.
  pub fn new(blocks: Vec<Core>, interior: &[f64]) -> Result<Self> {
    if blocks.is_empty() {
      return invalid("ordinal sum needs at least one block");
    }
    if interior.len() + 1 != blocks.len() {
      return invalid(format!(
        "ordinal sum of {} blocks needs {} interior bounds, got {}",
        blocks.len(),
        blocks.len() - 1,
        interior.len()
      ));
    }
    let d = blocks[0].dimension();
    if let Some(bad) = blocks.iter().find(|b| b.dimension() != d) {
      return invalid(format!(
        "ordinal sum blocks must share dimension {d}, got {}",
        bad.dimension()
      ));
    }
    if !blocks.iter().all(Core::is_copula) {
      return invalid("ordinal sum blocks must be copulas");
    }

    let mut all = Vec::with_capacity(interior.len() + 2);
    all.push(0.0);
    all.extend_from_slice(interior);
    all.push(1.0);
    if all.windows(2).any(|w| !(w[0] <= w[1])) {
      return invalid(format!("ordinal sum bounds {interior:?} must be nondecreasing in [0, 1]"));
    }

    let mut bounds = vec![0.0];
    let mut kept = Vec::with_capacity(blocks.len());
    for (k, block) in blocks.into_iter().enumerate() {
      if all[k + 1] > all[k] {
        bounds.push(all[k + 1]);
        kept.push(block);
      } else {
        warn!(
          block = k,
          bound = all[k],
          "dropping zero-length ordinal sum block"
        );
      }
    }

    Ok(Self {
      bounds,
      blocks: kept,
    })
  }

  pub fn dimension(&self) -> usize {
    self.blocks[0].dimension()
  }

  pub fn blocks(&self) -> &[Core] {
    &self.blocks
  }

  /// Full bounds `b_0, ..., b_n`.
  pub fn bounds(&self) -> &[f64] {
    &self.bounds
  }

  fn length(&self, k: usize) -> f64 {
    self.bounds[k + 1] - self.bounds[k]
  }

  /// Block whose interval holds `t`; the last block owns `t = 1`.
  fn block_of(&self, t: f64) -> usize {
    let n = self.blocks.len();
    self.bounds[1..n].partition_point(|&b| b <= t)
  }

  fn rescale(&self, k: usize, t: f64) -> f64 {
    (t - self.bounds[k]) / self.length(k)
  }

  fn in_block(&self, k: usize, u: &Array1<f64>) -> bool {
    u.iter()
      .all(|&v| self.bounds[k] <= v && v <= self.bounds[k + 1])
  }

  /// Candidate block chosen from the first coordinate, if `u` lies in its
  /// diagonal hypercube.
  fn diagonal_block(&self, u: &Array1<f64>) -> Option<usize> {
    let k = self.block_of(u[0]);
    self.in_block(k, u).then_some(k)
  }

  pub fn pdf(&self, u: &Array1<f64>) -> Result<f64> {
    if u.iter().any(|&v| !(0.0..=1.0).contains(&v)) {
      return Ok(0.0);
    }
    let Some(k) = self.diagonal_block(u) else {
      return Ok(0.0);
    };
    let len = self.length(k);
    let v = u.mapv(|t| self.rescale(k, t));
    Ok(self.blocks[k].pdf(&v)? * len.powi(1 - self.dimension() as i32))
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    let u = u.mapv(|v| v.clamp(0.0, 1.0));
    let m = u.fold(f64::INFINITY, |acc, &v| acc.min(v));
    let k = self.block_of(m);
    let (lo, hi) = (self.bounds[k], self.bounds[k + 1]);
    if m <= lo {
      return Ok(m);
    }
    let v = u.mapv(|t| self.rescale(k, t.min(hi)));
    Ok(lo + self.length(k) * self.blocks[k].cdf(&v)?)
  }

  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    if y.is_empty() {
      return Ok(if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 });
    }
    let Some(k) = self.diagonal_block(y) else {
      return Ok(0.0);
    };
    if x < self.bounds[k] || x > self.bounds[k + 1] {
      return Ok(0.0);
    }
    let v = y.mapv(|t| self.rescale(k, t));
    Ok(self.blocks[k].conditional_pdf(self.rescale(k, x), &v)? / self.length(k))
  }

  /// Off the diagonal hypercubes the conditional law is a step at `y_0`.
  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    if y.is_empty() {
      return Ok(x.clamp(0.0, 1.0));
    }
    let Some(k) = self.diagonal_block(y) else {
      return Ok(if x >= y[0] { 1.0 } else { 0.0 });
    };
    if x <= self.bounds[k] {
      return Ok(0.0);
    }
    if x >= self.bounds[k + 1] {
      return Ok(1.0);
    }
    let v = y.mapv(|t| self.rescale(k, t));
    self.blocks[k].conditional_cdf(self.rescale(k, x), &v)
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    if y.is_empty() {
      return Ok(q);
    }
    let Some(k) = self.diagonal_block(y) else {
      return Ok(y[0]);
    };
    let v = y.mapv(|t| self.rescale(k, t));
    Ok(self.bounds[k] + self.length(k) * self.blocks[k].conditional_quantile(q, &v)?)
  }

  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    let d = self.dimension();
    let mut rng = rand::thread_rng();
    let owners: Vec<usize> = (0..n).map(|_| self.block_of(rng.gen::<f64>())).collect();
    let mut out = Array2::<f64>::zeros((n, d));
    for (k, block) in self.blocks.iter().enumerate() {
      let rows: Vec<usize> = (0..n).filter(|&r| owners[r] == k).collect();
      if rows.is_empty() {
        continue;
      }
      let draws = block.sample(rows.len())?;
      for (draw, &r) in draws.axis_iter(Axis(0)).zip(&rows) {
        out
          .row_mut(r)
          .assign(&draw.mapv(|t| self.bounds[k] + self.length(k) * t));
      }
    }
    Ok(out)
  }

  /// Every marginal of an ordinal sum is the ordinal sum of the block marginals.
  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    let blocks = self
      .blocks
      .iter()
      .map(|b| b.marginal(indices))
      .collect::<Result<Vec<_>>>()?;
    let n = self.blocks.len();
    Ok(Core::OrdinalSum(Self::new(blocks, &self.bounds[1..n])?))
  }

  pub fn has_independent_copula(&self) -> bool {
    match self.blocks.as_slice() {
      [only] => only.has_independent_copula(),
      _ => self.dimension() == 1,
    }
  }

  pub fn parameters(&self) -> Vec<f64> {
    let n = self.blocks.len();
    self.bounds[1..n]
      .iter()
      .copied()
      .chain(self.blocks.iter().flat_map(Core::parameters))
      .collect()
  }

  pub fn parameter_names(&self) -> Vec<String> {
    let n = self.blocks.len();
    (1..n)
      .map(|k| format!("bound_{k}"))
      .chain(self.blocks.iter().enumerate().flat_map(|(k, block)| {
        block
          .parameter_names()
          .into_iter()
          .map(move |name| format!("block_{k}_{name}"))
      }))
      .collect()
  }

  pub fn with_parameters(&self, parameters: &[f64]) -> Result<Self> {
    check_dimension(self.parameters().len(), parameters.len(), "parameter vector")?;
    let n = self.blocks.len();
    let (interior, mut rest) = parameters.split_at(n - 1);
    let mut blocks = Vec::with_capacity(n);
    for block in &self.blocks {
      let (head, tail) = rest.split_at(block.parameters().len());
      blocks.push(block.with_parameters(head)?);
      rest = tail;
    }
    Self::new(blocks, interior)
  }

  pub fn supports_batch_sampling(&self) -> bool {
    self.blocks.iter().all(Core::supports_batch_sampling)
  }

  pub fn description(&self) -> String {
    let inner: Vec<String> = self.blocks.iter().map(Core::description).collect();
    format!(
      "OrdinalSumCopula(bounds={:?}, blocks=[{}])",
      &self.bounds,
      inner.join(", ")
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;

  fn fixture() -> OrdinalSumCopula {
    OrdinalSumCopula::new(
      vec![
        Core::independent(2).unwrap(),
        Core::normal(array![[1.0, 0.6], [0.6, 1.0]]).unwrap(),
      ],
      &[0.4],
    )
    .unwrap()
  }

  #[test]
  fn off_diagonal_mass_is_zero() {
    let c = fixture();
    let u = array![0.3, 0.5];
    assert_eq!(c.pdf(&u).unwrap(), 0.0);
    assert_abs_diff_eq!(c.cdf(&u).unwrap(), 0.3, epsilon = 1e-15);
    assert_abs_diff_eq!(c.cdf(&array![0.7, 0.2]).unwrap(), 0.2, epsilon = 1e-15);
  }

  #[test]
  fn diagonal_point_uses_the_rescaled_block() {
    // (0.5, 0.5) lies in [0.4, 1]^2.
    let c = fixture();
    let inner = c.blocks()[1].cdf(&array![1.0 / 6.0, 1.0 / 6.0]).unwrap();
    assert_abs_diff_eq!(
      c.cdf(&array![0.5, 0.5]).unwrap(),
      0.4 + 0.6 * inner,
      epsilon = 1e-12
    );
    let density = c.blocks()[1].pdf(&array![1.0 / 6.0, 0.5]).unwrap() / 0.6;
    assert_abs_diff_eq!(c.pdf(&array![0.5, 0.7]).unwrap(), density, epsilon = 1e-12);
  }

  #[test]
  fn independent_block_in_lower_corner() {
    let c = fixture();
    // Inside [0, 0.4]^2 the mass is 0.4 * (u/0.4)(v/0.4).
    assert_abs_diff_eq!(c.cdf(&array![0.2, 0.1]).unwrap(), 0.05, epsilon = 1e-15);
    assert_abs_diff_eq!(c.pdf(&array![0.2, 0.1]).unwrap(), 2.5, epsilon = 1e-15);
  }

  #[test]
  fn single_block_is_the_block_itself() {
    let c = OrdinalSumCopula::new(vec![Core::independent(2).unwrap()], &[]).unwrap();
    let u = array![0.3, 0.8];
    assert_abs_diff_eq!(c.cdf(&u).unwrap(), 0.24, epsilon = 1e-15);
    assert_eq!(c.pdf(&u).unwrap(), 1.0);
    assert!(c.has_independent_copula());
  }

  #[test]
  #[traced_test]
  fn zero_length_blocks_are_dropped_with_a_warning() {
    let c = OrdinalSumCopula::new(
      vec![
        Core::independent(2).unwrap(),
        Core::independent(2).unwrap(),
        Core::independent(2).unwrap(),
      ],
      &[0.5, 0.5],
    )
    .unwrap();
    assert_eq!(c.blocks().len(), 2);
    assert_eq!(c.bounds(), &[0.0, 0.5, 1.0]);
    assert!(logs_contain("dropping zero-length ordinal sum block"));
  }

  #[test]
  fn conditional_quantile_stays_in_the_block() {
    let c = fixture();
    let y = array![0.7];
    let x = c.conditional_quantile(0.25, &y).unwrap();
    assert!((0.4..=1.0).contains(&x));
    assert_abs_diff_eq!(c.conditional_cdf(x, &y).unwrap(), 0.25, epsilon = 1e-10);
    assert_eq!(c.conditional_cdf(0.39, &y).unwrap(), 0.0);
  }

  #[test]
  fn samples_land_on_the_diagonal_blocks() {
    let c = fixture();
    let s = c.sample(2000).unwrap();
    for row in s.axis_iter(Axis(0)) {
      let lower = row[0] < 0.4;
      assert_eq!(lower, row[1] < 0.4);
    }
  }

  #[test]
  fn mismatched_bounds_are_rejected() {
    let err = OrdinalSumCopula::new(vec![Core::independent(2).unwrap()], &[0.3]).unwrap_err();
    assert!(err.is_invalid_argument());
  }
}
