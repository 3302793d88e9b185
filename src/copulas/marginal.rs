//! # Marginal extraction
//!
//! $$
//! C_I(u_I)=C(u_I,\mathbf 1_{\bar I}),\qquad
//! c_I(u_I)=\int_{[0,1]^{|\bar I|}}c(u_I,t)\,dt
//! $$
//!
//! Fallback for index subsets a structure cannot extract natively. Hidden
//! coordinates are integrated out with a tensor Gauss-Legendre rule.
//!
use ndarray::Array1;
use ndarray::Array2;

use super::Core;
use crate::conditional::conditional_cdf_from_prefix;
use crate::conditional::conditional_pdf_from_prefix;
use crate::conditional::invert_unit_cdf;
use crate::config::MARGINAL_INTEGRATION_NODES;
use crate::error::invalid;
use crate::error::Result;
use crate::quadrature::unit_rule;

#[derive(Debug, Clone)]
pub struct MarginalCopula {
  parent: Box<Core>,
  indices: Vec<usize>,
}

impl MarginalCopula {
  pub fn new(parent: Core, indices: Vec<usize>) -> Result<Self> {
    if indices.is_empty() || indices.iter().any(|&i| i >= parent.dimension()) {
      return invalid(format!(
        "marginal indices {indices:?} do not fit a structure of dimension {}",
        parent.dimension()
      ));
    }
    Ok(Self {
      parent: Box::new(parent),
      indices,
    })
  }

  pub fn dimension(&self) -> usize {
    self.indices.len()
  }

  pub fn parent(&self) -> &Core {
    &self.parent
  }

  pub fn indices(&self) -> &[usize] {
    &self.indices
  }

  /// Density of `parent` marginalised onto `visible`, evaluated at `u`.
  fn integrated_pdf(&self, visible: &[usize], u: &Array1<f64>) -> Result<f64> {
    if let Core::BlockComposed(parent) = self.parent.as_ref() {
      return parent.subset_pdf(visible, u);
    }
    let d = self.parent.dimension();
    let mut point = Array1::<f64>::ones(d);
    for (&i, &v) in visible.iter().zip(u.iter()) {
      point[i] = v;
    }
    let hidden: Vec<usize> = (0..d).filter(|i| !visible.contains(i)).collect();
    if hidden.is_empty() {
      return self.parent.pdf(&point);
    }

    let rule = unit_rule(MARGINAL_INTEGRATION_NODES)?;
    let n = rule.len();
    let mut counter = vec![0usize; hidden.len()];
    let mut acc = 0.0;
    loop {
      let mut weight = 1.0;
      for (h, &k) in hidden.iter().zip(&counter) {
        point[*h] = rule.nodes[k];
        weight *= rule.weights[k];
      }
      acc += weight * self.parent.pdf(&point)?;

      // Odometer increment over the tensor grid.
      let mut pos = 0;
      loop {
        if pos == counter.len() {
          return Ok(acc);
        }
        counter[pos] += 1;
        if counter[pos] < n {
          break;
        }
        counter[pos] = 0;
        pos += 1;
      }
    }
  }

  pub fn pdf(&self, u: &Array1<f64>) -> Result<f64> {
    if u.iter().any(|&v| !(0.0..=1.0).contains(&v)) {
      return Ok(0.0);
    }
    self.integrated_pdf(&self.indices, u)
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    let mut point = Array1::<f64>::ones(self.parent.dimension());
    for (&i, &v) in self.indices.iter().zip(u.iter()) {
      point[i] = v;
    }
    self.parent.cdf(&point)
  }

  fn prefix_pdf(&self, p: &Array1<f64>) -> Result<f64> {
    self.integrated_pdf(&self.indices[..p.len()], p)
  }

  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    conditional_pdf_from_prefix(x, y, |p| self.prefix_pdf(p))
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    conditional_cdf_from_prefix(x, y, |p| self.prefix_pdf(p))
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    invert_unit_cdf(q, |t| self.conditional_cdf(t, y))
  }

  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    let draws = self.parent.sample(n)?;
    Ok(draws.select(ndarray::Axis(1), &self.indices))
  }

  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    let composed: Vec<usize> = indices.iter().map(|&i| self.indices[i]).collect();
    if composed.windows(2).all(|w| w[0] < w[1]) {
      return self.parent.marginal(&composed);
    }
    Ok(Core::Marginal(Self::new((*self.parent).clone(), composed)?))
  }

  pub fn has_independent_copula(&self) -> bool {
    if self.dimension() == 1 || self.parent.has_independent_copula() {
      return true;
    }
    match self.parent.as_ref() {
      Core::BlockComposed(parent) => parent.subset_has_independent_copula(&self.indices),
      _ => false,
    }
  }

  pub fn kendall_tau(&self) -> Result<Array2<f64>> {
    let tau = self.parent.kendall_tau()?;
    let d = self.dimension();
    Ok(Array2::from_shape_fn((d, d), |(i, j)| {
      tau[[self.indices[i], self.indices[j]]]
    }))
  }

  pub fn description(&self) -> String {
    format!(
      "MarginalCopula(indices={:?}, parent={})",
      self.indices,
      self.parent.description()
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn parent() -> Core {
    Core::block_composed(vec![
      Core::normal(array![[1.0, 0.5], [0.5, 1.0]]).unwrap(),
      Core::normal(array![[1.0, -0.4], [-0.4, 1.0]]).unwrap(),
    ])
    .unwrap()
  }

  #[test]
  fn permuted_pair_inside_a_block() {
    // Coordinates 1 and 0 of the first block, in reverse order.
    let m = MarginalCopula::new(parent(), vec![1, 0]).unwrap();
    let reference = Core::normal(array![[1.0, 0.5], [0.5, 1.0]]).unwrap();
    let u = array![0.3, 0.7];
    assert_abs_diff_eq!(
      m.cdf(&u).unwrap(),
      reference.cdf(&array![0.7, 0.3]).unwrap(),
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(
      m.pdf(&u).unwrap(),
      reference.pdf(&array![0.7, 0.3]).unwrap(),
      epsilon = 2e-2
    );
  }

  #[test]
  fn gapped_pair_across_blocks_is_independent() {
    let m = MarginalCopula::new(parent(), vec![0, 3]).unwrap();
    let u = array![0.3, 0.6];
    assert_abs_diff_eq!(m.cdf(&u).unwrap(), 0.18, epsilon = 1e-12);
    assert_abs_diff_eq!(m.pdf(&u).unwrap(), 1.0, epsilon = 5e-3);
  }

  #[test]
  fn generic_conditional_cdf_is_monotone_and_invertible() {
    let m = MarginalCopula::new(parent(), vec![1, 0]).unwrap();
    let y = array![0.25];
    let a = m.conditional_cdf(0.3, &y).unwrap();
    let b = m.conditional_cdf(0.6, &y).unwrap();
    assert!(a < b);
    let x = m.conditional_quantile(0.4, &y).unwrap();
    assert_abs_diff_eq!(m.conditional_cdf(x, &y).unwrap(), 0.4, epsilon = 1e-8);
  }

  #[test]
  fn independence_is_read_from_the_visible_blocks() {
    assert!(MarginalCopula::new(parent(), vec![0, 3]).unwrap().has_independent_copula());
    assert!(MarginalCopula::new(parent(), vec![3, 0]).unwrap().has_independent_copula());
    assert!(!MarginalCopula::new(parent(), vec![1, 0]).unwrap().has_independent_copula());
    assert!(!MarginalCopula::new(parent(), vec![2, 0, 3])
      .unwrap()
      .has_independent_copula());
  }

  #[test]
  fn block_parent_density_factorises() {
    let m = MarginalCopula::new(parent(), vec![3, 0, 2]).unwrap();
    let u = array![0.2, 0.6, 0.9];
    let second = Core::normal(array![[1.0, -0.4], [-0.4, 1.0]]).unwrap();
    assert_abs_diff_eq!(
      m.pdf(&u).unwrap(),
      second.pdf(&array![0.2, 0.9]).unwrap(),
      epsilon = 1e-12
    );
  }
}
