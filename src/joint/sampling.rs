//! # Sampling
//!
//! $$
//! X^{(k)}=\big(F_1^{-1}(U^{(k)}_1),\dots,F_d^{-1}(U^{(k)}_d)\big),\qquad U^{(k)}\sim C
//! $$
//!
use ndarray::parallel::prelude::*;
use ndarray::Array2;
use ndarray::ArrayViewMut2;
use ndarray::Axis;
use tracing::trace;

use super::JointDistribution;
use crate::error::Result;

impl JointDistribution {
  /// True when rows can be generated on independent workers.
  fn parallel_sampling(&self, n: usize) -> bool {
    n >= self.settings.parallel_sampling_threshold
      && self.core.supports_batch_sampling()
      && !self.components.iter().any(|c| c.is_stateful())
  }

  /// Fills every row of `rows` with fresh realizations.
  fn fill_rows(&self, mut rows: ArrayViewMut2<f64>) -> Result<()> {
    let n = rows.nrows();
    if self.is_independent() {
      let mut rng = rand::thread_rng();
      for mut row in rows.axis_iter_mut(Axis(0)) {
        for (x, c) in row.iter_mut().zip(&self.components) {
          *x = c.sample(&mut rng);
        }
      }
      return Ok(());
    }

    let u = self.core.sample(n)?;
    for (mut row, u_row) in rows.axis_iter_mut(Axis(0)).zip(u.axis_iter(Axis(0))) {
      for ((x, &ui), c) in row.iter_mut().zip(u_row.iter()).zip(&self.components) {
        *x = c.quantile(ui);
      }
    }
    Ok(())
  }

  /// `n` realizations, one per row.
  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::zeros((n, self.dimension()));
    if !self.parallel_sampling(n) {
      self.fill_rows(out.view_mut())?;
      return Ok(out);
    }

    let chunk = self.settings.sampling_chunk_size.max(1);
    trace!(n, chunk, "sampling in parallel chunks");
    out
      .axis_chunks_iter_mut(Axis(0), chunk)
      .into_par_iter()
      .try_for_each(|rows| self.fill_rows(rows))?;
    Ok(out)
  }
}
