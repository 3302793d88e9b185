//! # Block-composed
//!
//! $$
//! C(u)=\prod_{k=1}^{m} C_k\big(u_{[o_k,\,o_{k+1})}\big)
//! $$
//!
//! Independent concatenation of sub-structures acting on consecutive
//! coordinate blocks.
//!
use std::collections::BTreeMap;

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;

use super::marginal::MarginalCopula;
use super::Core;
use crate::error::check_dimension;
use crate::error::invalid;
use crate::error::Result;
use crate::standard::normal_cdf;
use crate::standard::normal_quantile;
use crate::traits::EllipticalFamily;

#[derive(Debug, Clone)]
pub struct BlockComposedCopula {
  blocks: Vec<Core>,
  /// `offsets[k]` is the first coordinate of block `k`; the last entry is the dimension.
  offsets: Vec<usize>,
}

impl BlockComposedCopula {
  pub fn new(blocks: Vec<Core>) -> Result<Self> {
    if blocks.is_empty() {
      return invalid("block-composed structure needs at least one block");
    }
    let mut offsets = Vec::with_capacity(blocks.len() + 1);
    offsets.push(0);
    for block in &blocks {
      offsets.push(offsets[offsets.len() - 1] + block.dimension());
    }
    Ok(Self { blocks, offsets })
  }

  pub fn dimension(&self) -> usize {
    self.offsets[self.blocks.len()]
  }

  pub fn blocks(&self) -> &[Core] {
    &self.blocks
  }

  /// Block owning coordinate `i` and the coordinate's position inside it.
  fn locate(&self, i: usize) -> (usize, usize) {
    let k = self.offsets.partition_point(|&o| o <= i) - 1;
    (k, i - self.offsets[k])
  }

  fn part(&self, u: &Array1<f64>, k: usize) -> Array1<f64> {
    u.slice(s![self.offsets[k]..self.offsets[k + 1]]).to_owned()
  }

  pub fn pdf(&self, u: &Array1<f64>) -> Result<f64> {
    let mut density = 1.0;
    for (k, block) in self.blocks.iter().enumerate() {
      density *= block.pdf(&self.part(u, k))?;
      if density == 0.0 {
        break;
      }
    }
    Ok(density)
  }

  pub fn log_pdf(&self, u: &Array1<f64>) -> Result<f64> {
    let mut acc = 0.0;
    for (k, block) in self.blocks.iter().enumerate() {
      acc += block.log_pdf(&self.part(u, k))?;
    }
    Ok(acc)
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    let mut probability = 1.0;
    for (k, block) in self.blocks.iter().enumerate() {
      probability *= block.cdf(&self.part(u, k))?;
      if probability == 0.0 {
        break;
      }
    }
    Ok(probability)
  }

  /// The block owning coordinate `y.len()` and the part of `y` it owns.
  fn owner(&self, y: &Array1<f64>) -> (&Core, Array1<f64>) {
    let (k, _) = self.locate(y.len());
    let own = y.slice(s![self.offsets[k]..]).to_owned();
    (&self.blocks[k], own)
  }

  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    let (block, own) = self.owner(y);
    block.conditional_pdf(x, &own)
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    let (block, own) = self.owner(y);
    block.conditional_cdf(x, &own)
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    let (block, own) = self.owner(y);
    block.conditional_quantile(q, &own)
  }

  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::zeros((n, self.dimension()));
    for (k, block) in self.blocks.iter().enumerate() {
      out
        .slice_mut(s![.., self.offsets[k]..self.offsets[k + 1]])
        .assign(&block.sample(n)?);
    }
    Ok(out)
  }

  /// Native marginals inside one block or across adjacent blocks taken in
  /// increasing order; the generic extraction otherwise.
  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    let mut runs: Vec<(usize, Vec<usize>)> = Vec::new();
    for &i in indices {
      let (k, local) = self.locate(i);
      match runs.last_mut() {
        Some((last, locals)) if *last == k => locals.push(local),
        _ => runs.push((k, vec![local])),
      }
    }

    if let [(k, locals)] = runs.as_slice() {
      return self.blocks[*k].marginal(locals);
    }

    let increasing = indices.windows(2).all(|w| w[0] < w[1]);
    let adjacent = runs.windows(2).all(|w| w[1].0 == w[0].0 + 1);
    if increasing && adjacent {
      let blocks = runs
        .iter()
        .map(|(k, locals)| self.blocks[*k].marginal(locals))
        .collect::<Result<Vec<_>>>()?;
      return Ok(Core::BlockComposed(BlockComposedCopula::new(blocks)?));
    }

    Ok(Core::Marginal(MarginalCopula::new(
      Core::BlockComposed(self.clone()),
      indices.to_vec(),
    )?))
  }

  pub fn is_copula(&self) -> bool {
    self.blocks.iter().all(Core::is_copula)
  }

  /// Visible coordinates grouped by owning block, in order of first
  /// appearance, with their local positions and values.
  fn group_by_block(&self, indices: &[usize], u: &[f64]) -> Vec<(usize, Vec<usize>, Vec<f64>)> {
    let mut groups: BTreeMap<usize, (Vec<usize>, Vec<f64>)> = BTreeMap::new();
    for (&i, &v) in indices.iter().zip(u) {
      let (k, local) = self.locate(i);
      let entry = groups.entry(k).or_default();
      entry.0.push(local);
      entry.1.push(v);
    }
    groups
      .into_iter()
      .map(|(k, (locals, values))| (k, locals, values))
      .collect()
  }

  /// True when the coordinates `indices` are mutually independent: every
  /// block sees at most an independent subset of its coordinates.
  pub fn subset_has_independent_copula(&self, indices: &[usize]) -> bool {
    let zeros = vec![0.0; indices.len()];
    self
      .group_by_block(indices, &zeros)
      .iter()
      .all(|(k, locals, _)| {
        locals.len() == 1
          || self.blocks[*k]
            .marginal(locals)
            .is_ok_and(|m| m.has_independent_copula())
      })
  }

  /// Density of the marginal on `indices`; hidden blocks integrate to one.
  pub fn subset_pdf(&self, indices: &[usize], u: &Array1<f64>) -> Result<f64> {
    let values = u.to_vec();
    let mut density = 1.0;
    for (k, locals, values) in self.group_by_block(indices, &values) {
      if locals.len() == 1 {
        continue;
      }
      density *= self.blocks[k].marginal(&locals)?.pdf(&Array1::from(values))?;
      if density == 0.0 {
        break;
      }
    }
    Ok(density)
  }

  pub fn has_independent_copula(&self) -> bool {
    self.blocks.iter().all(Core::has_independent_copula)
  }

  /// Normal and independent blocks compose into a Normal copula with a
  /// block-diagonal correlation; a lone block keeps its own shape.
  pub fn elliptical_shape(&self) -> Option<(EllipticalFamily, Array2<f64>)> {
    if let [only] = self.blocks.as_slice() {
      return only.elliptical_shape();
    }
    let d = self.dimension();
    let mut shape = Array2::<f64>::eye(d);
    for (k, block) in self.blocks.iter().enumerate() {
      if block.has_independent_copula() {
        continue;
      }
      match block.elliptical_shape() {
        Some((EllipticalFamily::Normal, r)) => shape
          .slice_mut(s![
            self.offsets[k]..self.offsets[k + 1],
            self.offsets[k]..self.offsets[k + 1]
          ])
          .assign(&r),
        _ => return None,
      }
    }
    Some((EllipticalFamily::Normal, shape))
  }

  /// Blocks are mutually independent, so the chain factorises per block.
  pub fn has_own_transform(&self) -> bool {
    true
  }

  fn block_transform(block: &Core, u: &Array1<f64>) -> Result<Array1<f64>> {
    if block.has_own_transform() {
      return block.own_transform(u);
    }
    Ok(block.sequential_conditional_cdf(u)?.mapv(normal_quantile))
  }

  fn block_inverse_transform(block: &Core, z: &Array1<f64>) -> Result<Array1<f64>> {
    if block.has_own_transform() {
      return block.own_inverse_transform(z);
    }
    block.sequential_conditional_quantile(&z.mapv(normal_cdf))
  }

  pub fn own_transform(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(self.dimension());
    for (k, block) in self.blocks.iter().enumerate() {
      out
        .slice_mut(s![self.offsets[k]..self.offsets[k + 1]])
        .assign(&Self::block_transform(block, &self.part(u, k))?);
    }
    Ok(out)
  }

  pub fn own_inverse_transform(&self, z: &Array1<f64>) -> Result<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(self.dimension());
    for (k, block) in self.blocks.iter().enumerate() {
      out
        .slice_mut(s![self.offsets[k]..self.offsets[k + 1]])
        .assign(&Self::block_inverse_transform(block, &self.part(z, k))?);
    }
    Ok(out)
  }

  pub fn kendall_tau(&self) -> Result<Array2<f64>> {
    let d = self.dimension();
    let mut tau = Array2::<f64>::eye(d);
    for (k, block) in self.blocks.iter().enumerate() {
      tau
        .slice_mut(s![
          self.offsets[k]..self.offsets[k + 1],
          self.offsets[k]..self.offsets[k + 1]
        ])
        .assign(&block.kendall_tau()?);
    }
    Ok(tau)
  }

  pub fn parameters(&self) -> Vec<f64> {
    self.blocks.iter().flat_map(Core::parameters).collect()
  }

  pub fn parameter_names(&self) -> Vec<String> {
    self
      .blocks
      .iter()
      .enumerate()
      .flat_map(|(k, block)| {
        block
          .parameter_names()
          .into_iter()
          .map(move |name| format!("block_{k}_{name}"))
      })
      .collect()
  }

  pub fn with_parameters(&self, parameters: &[f64]) -> Result<Self> {
    check_dimension(self.parameters().len(), parameters.len(), "parameter vector")?;
    let mut rest = parameters;
    let mut blocks = Vec::with_capacity(self.blocks.len());
    for block in &self.blocks {
      let (head, tail) = rest.split_at(block.parameters().len());
      blocks.push(block.with_parameters(head)?);
      rest = tail;
    }
    Self::new(blocks)
  }

  pub fn supports_batch_sampling(&self) -> bool {
    self.blocks.iter().all(Core::supports_batch_sampling)
  }

  pub fn description(&self) -> String {
    let inner: Vec<String> = self.blocks.iter().map(Core::description).collect();
    format!("BlockComposedCopula({})", inner.join(", "))
  }
}
