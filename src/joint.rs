//! # Joint
//!
//! $$
//! f(x)=c\big(F_1(x_1),\dots,F_d(x_d)\big)\prod_{i=1}^d f_i(x_i)
//! $$
//!
//! Joint distribution assembled from shared per-component distributions and a
//! dependence structure on the unit hypercube.
//!
pub mod covariance;
pub mod sampling;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;

use ndarray::parallel::prelude::*;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use tracing::debug;

use crate::config::Settings;
use crate::config::MAX_INCLUSION_EXCLUSION_DIMENSION;
use crate::copulas::Core;
use crate::error::check_dimension;
use crate::error::check_probability;
use crate::error::invalid;
use crate::error::Result;
use crate::linalg::central_difference;
use crate::traits::EllipticalFamily;
use crate::traits::Interval;
use crate::traits::MultivariateExt;
use crate::traits::UnivariateExt;

/// Memoised moments; every mutator of the joint distribution resets it.
#[derive(Debug, Clone, Default)]
pub(crate) struct MomentCache {
  mean: OnceLock<Array1<f64>>,
  covariance: OnceLock<Array2<f64>>,
}

impl MomentCache {
  fn invalidate(&mut self) {
    *self = Self::default();
  }
}

#[derive(Debug, Clone)]
pub struct JointDistribution {
  components: Vec<Arc<dyn UnivariateExt>>,
  core: Core,
  description: Vec<String>,
  settings: Settings,
  moments: MomentCache,
}

/// Result of a marginal extraction.
#[derive(Debug, Clone)]
pub enum MarginalDistribution {
  Component(Arc<dyn UnivariateExt>),
  Joint(JointDistribution),
}

impl MarginalDistribution {
  pub fn dimension(&self) -> usize {
    match self {
      MarginalDistribution::Component(_) => 1,
      MarginalDistribution::Joint(j) => j.dimension(),
    }
  }

  pub fn pdf(&self, x: &Array1<f64>) -> Result<f64> {
    match self {
      MarginalDistribution::Component(c) => {
        check_dimension(1, x.len(), "point")?;
        Ok(c.pdf(x[0]))
      }
      MarginalDistribution::Joint(j) => j.pdf(x),
    }
  }

  pub fn cdf(&self, x: &Array1<f64>) -> Result<f64> {
    match self {
      MarginalDistribution::Component(c) => {
        check_dimension(1, x.len(), "point")?;
        Ok(c.cdf(x[0]))
      }
      MarginalDistribution::Joint(j) => j.cdf(x),
    }
  }

  pub fn as_component(&self) -> Option<&Arc<dyn UnivariateExt>> {
    match self {
      MarginalDistribution::Component(c) => Some(c),
      MarginalDistribution::Joint(_) => None,
    }
  }

  pub fn as_joint(&self) -> Option<&JointDistribution> {
    match self {
      MarginalDistribution::Component(_) => None,
      MarginalDistribution::Joint(j) => Some(j),
    }
  }
}

/// Component descriptions with duplicates made unique by an index suffix.
fn unique_descriptions(components: &[Arc<dyn UnivariateExt>]) -> Vec<String> {
  let mut seen = HashSet::new();
  components
    .iter()
    .enumerate()
    .map(|(i, c)| {
      let name = c.description();
      if seen.insert(name.clone()) {
        name
      } else {
        let renamed = format!("{name}_{i}");
        debug!(component = i, from = %name, to = %renamed, "renaming duplicate description");
        seen.insert(renamed.clone());
        renamed
      }
    })
    .collect()
}

fn check_components(components: &[Arc<dyn UnivariateExt>], core: &Core) -> Result<()> {
  if components.is_empty() {
    return invalid("joint distribution needs at least one component");
  }
  if let Some(i) = components.iter().position(|c| c.dimension() != 1) {
    return invalid(format!("component {i} is not one-dimensional"));
  }
  check_dimension(core.dimension(), components.len(), "component list")
}

impl JointDistribution {
  pub fn new(components: Vec<Arc<dyn UnivariateExt>>, core: Core) -> Result<Self> {
    check_components(&components, &core)?;
    Ok(Self {
      description: unique_descriptions(&components),
      components,
      core,
      settings: Settings::default(),
      moments: MomentCache::default(),
    })
  }

  /// Components joined by the independent copula.
  pub fn independent(components: Vec<Arc<dyn UnivariateExt>>) -> Result<Self> {
    let core = Core::independent(components.len())?;
    Self::new(components, core)
  }

  pub fn with_settings(mut self, settings: Settings) -> Self {
    self.settings = settings;
    self.moments.invalidate();
    self
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn dimension(&self) -> usize {
    self.components.len()
  }

  pub fn components(&self) -> &[Arc<dyn UnivariateExt>] {
    &self.components
  }

  pub fn core(&self) -> &Core {
    &self.core
  }

  pub fn description(&self) -> &[String] {
    &self.description
  }

  pub fn set_core(&mut self, core: Core) -> Result<()> {
    check_components(&self.components, &core)?;
    self.core = core;
    self.moments.invalidate();
    Ok(())
  }

  pub fn set_components(&mut self, components: Vec<Arc<dyn UnivariateExt>>) -> Result<()> {
    check_components(&components, &self.core)?;
    self.description = unique_descriptions(&components);
    self.components = components;
    self.moments.invalidate();
    Ok(())
  }

  pub fn is_independent(&self) -> bool {
    self.core.has_independent_copula()
  }

  /// Elliptical copula whose family every component shares, each component
  /// being a location-scale member of it.
  pub fn is_elliptical(&self) -> bool {
    let Some(family) = self.core.elliptical_family() else {
      return false;
    };
    self
      .components
      .iter()
      .all(|c| c.elliptical_family() == Some(family) && c.location_scale().is_some())
  }

  pub fn elliptical_family(&self) -> Option<EllipticalFamily> {
    self.core.elliptical_family()
  }

  pub fn range(&self) -> Vec<Interval> {
    self.components.iter().map(|c| c.range()).collect()
  }

  fn check_point(&self, x: &Array1<f64>) -> Result<()> {
    check_dimension(self.dimension(), x.len(), "point")
  }

  fn check_prefix(&self, y: &Array1<f64>) -> Result<()> {
    if y.len() >= self.dimension() {
      return invalid(format!(
        "conditioning point has dimension {}, expected less than {}",
        y.len(),
        self.dimension()
      ));
    }
    Ok(())
  }

  /// `u_i = F_i(x_i)`.
  pub(crate) fn to_unit(&self, x: &Array1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(x.len(), |i| self.components[i].cdf(x[i]))
  }

  pub(crate) fn from_unit(&self, u: &Array1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(u.len(), |i| self.components[i].quantile(u[i]))
  }

  pub fn pdf(&self, x: &Array1<f64>) -> Result<f64> {
    self.check_point(x)?;
    let product: f64 = x
      .iter()
      .zip(&self.components)
      .map(|(&xi, c)| c.pdf(xi))
      .product();
    if self.is_independent() || product == 0.0 {
      return Ok(product);
    }
    Ok(self.core.pdf(&self.to_unit(x))? * product)
  }

  pub fn log_pdf(&self, x: &Array1<f64>) -> Result<f64> {
    self.check_point(x)?;
    let sum: f64 = x
      .iter()
      .zip(&self.components)
      .map(|(&xi, c)| c.log_pdf(xi))
      .sum();
    if self.is_independent() || sum == f64::NEG_INFINITY {
      return Ok(sum);
    }
    Ok(self.core.log_pdf(&self.to_unit(x))? + sum)
  }

  pub fn cdf(&self, x: &Array1<f64>) -> Result<f64> {
    self.check_point(x)?;
    if self.is_independent() {
      return Ok(
        x.iter()
          .zip(&self.components)
          .map(|(&xi, c)| c.cdf(xi))
          .product(),
      );
    }
    self.core.cdf(&self.to_unit(x))
  }

  /// `P(X_1 > x_1, ..., X_d > x_d)` by inclusion-exclusion over the CDF.
  pub fn survival(&self, x: &Array1<f64>) -> Result<f64> {
    self.check_point(x)?;
    if self.is_independent() {
      return Ok(
        x.iter()
          .zip(&self.components)
          .map(|(&xi, c)| c.sf(xi))
          .product(),
      );
    }
    let d = self.inclusion_exclusion_dimension()?;
    let u = self.to_unit(x);
    let mut acc = 0.0;
    for mask in 0u64..(1u64 << d) {
      let mut vertex = Array1::<f64>::ones(d);
      for i in 0..d {
        if mask & (1 << i) != 0 {
          vertex[i] = u[i];
        }
      }
      let sign = if mask.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
      acc += sign * self.core.cdf(&vertex)?;
    }
    Ok(acc.clamp(0.0, 1.0))
  }

  /// Probability of the box `[lower, upper]`.
  pub fn probability(&self, lower: &Array1<f64>, upper: &Array1<f64>) -> Result<f64> {
    self.check_point(lower)?;
    self.check_point(upper)?;
    if lower.iter().zip(upper).any(|(a, b)| a >= b) {
      return Ok(0.0);
    }
    if self.is_independent() {
      return Ok(
        self
          .components
          .iter()
          .enumerate()
          .map(|(i, c)| c.cdf(upper[i]) - c.cdf(lower[i]))
          .product(),
      );
    }
    let d = self.inclusion_exclusion_dimension()?;
    let a = self.to_unit(lower);
    let b = self.to_unit(upper);
    let mut acc = 0.0;
    for mask in 0u64..(1u64 << d) {
      let vertex = Array1::from_shape_fn(d, |i| if mask & (1 << i) != 0 { a[i] } else { b[i] });
      let sign = if mask.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
      acc += sign * self.core.cdf(&vertex)?;
    }
    Ok(acc.clamp(0.0, 1.0))
  }

  fn inclusion_exclusion_dimension(&self) -> Result<usize> {
    let d = self.dimension();
    if d > MAX_INCLUSION_EXCLUSION_DIMENSION {
      return invalid(format!(
        "inclusion-exclusion over 2^{d} vertices exceeds the limit of dimension {MAX_INCLUSION_EXCLUSION_DIMENSION}"
      ));
    }
    Ok(d)
  }

  /// Row-wise density of a sample, evaluated on the rayon pool.
  pub fn compute_pdf(&self, sample: &Array2<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), sample.ncols(), "sample")?;
    let values = sample
      .axis_iter(Axis(0))
      .into_par_iter()
      .map(|row| self.pdf(&row.to_owned()))
      .collect::<Result<Vec<_>>>()?;
    Ok(Array1::from(values))
  }

  pub fn compute_cdf(&self, sample: &Array2<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), sample.ncols(), "sample")?;
    let values = sample
      .axis_iter(Axis(0))
      .into_par_iter()
      .map(|row| self.cdf(&row.to_owned()))
      .collect::<Result<Vec<_>>>()?;
    Ok(Array1::from(values))
  }

  /// Point on the image of the diagonal whose CDF equals `p`.
  pub fn quantile(&self, p: f64) -> Result<Array1<f64>> {
    check_probability(p)?;
    Ok(self.from_unit(&self.core.scalar_quantile(p)?))
  }

  /// Density of component `y.len()` given the preceding components `y`.
  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    let component = &self.components[y.len()];
    let density = component.pdf(x);
    if y.is_empty() || self.is_independent() || density == 0.0 {
      return Ok(density);
    }
    Ok(self.core.conditional_pdf(component.cdf(x), &self.to_unit(y))? * density)
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    let component = &self.components[y.len()];
    if y.is_empty() || self.is_independent() {
      return Ok(component.cdf(x));
    }
    self.core.conditional_cdf(component.cdf(x), &self.to_unit(y))
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    check_probability(q)?;
    let component = &self.components[y.len()];
    if y.is_empty() || self.is_independent() {
      return Ok(component.quantile(q));
    }
    Ok(component.quantile(self.core.conditional_quantile(q, &self.to_unit(y))?))
  }

  pub fn sequential_conditional_pdf(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
    self.check_point(x)?;
    let densities = Array1::from_shape_fn(x.len(), |i| self.components[i].pdf(x[i]));
    if self.is_independent() {
      return Ok(densities);
    }
    Ok(self.core.sequential_conditional_pdf(&self.to_unit(x))? * densities)
  }

  pub fn sequential_conditional_cdf(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
    self.check_point(x)?;
    let u = self.to_unit(x);
    if self.is_independent() {
      return Ok(u);
    }
    self.core.sequential_conditional_cdf(&u)
  }

  pub fn sequential_conditional_quantile(&self, q: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), q.len(), "probability vector")?;
    if let Some(&bad) = q.iter().find(|p| !(0.0..=1.0).contains(*p)) {
      check_probability(bad)?;
    }
    if self.is_independent() {
      return Ok(self.from_unit(q));
    }
    Ok(self.from_unit(&self.core.sequential_conditional_quantile(q)?))
  }

  /// Density with component `i` swapped for `component`.
  fn pdf_with_component(
    &self,
    i: usize,
    component: &dyn UnivariateExt,
    x: &Array1<f64>,
  ) -> Result<f64> {
    let mut u = Array1::<f64>::zeros(x.len());
    let mut product = 1.0;
    for j in 0..x.len() {
      let (cdf, pdf) = if j == i {
        (component.cdf(x[j]), component.pdf(x[j]))
      } else {
        (self.components[j].cdf(x[j]), self.components[j].pdf(x[j]))
      };
      u[j] = cdf;
      product *= pdf;
    }
    if product == 0.0 {
      return Ok(0.0);
    }
    Ok(self.core.pdf(&u)? * product)
  }

  fn cdf_with_component(
    &self,
    i: usize,
    component: &dyn UnivariateExt,
    x: &Array1<f64>,
  ) -> Result<f64> {
    let mut u = self.to_unit(x);
    u[i] = component.cdf(x[i]);
    self.core.cdf(&u)
  }

  /// Gradient of the density with respect to `parameters()`.
  pub fn pdf_gradient(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
    self.check_point(x)?;
    let densities: Vec<f64> = (0..x.len()).map(|i| self.components[i].pdf(x[i])).collect();
    let mut gradient = Vec::with_capacity(self.parameters().len());

    for (i, component) in self.components.iter().enumerate() {
      let part = if self.is_independent() {
        let others: f64 = densities
          .iter()
          .enumerate()
          .filter(|&(j, _)| j != i)
          .map(|(_, f)| f)
          .product();
        component.pdf_gradient(x[i])? * others
      } else {
        central_difference(
          &component.parameters(),
          self.settings.finite_difference_step,
          |p| self.pdf_with_component(i, component.with_parameters(p)?.as_ref(), x),
        )?
      };
      gradient.extend(part.iter());
    }

    let product: f64 = densities.iter().product();
    let core = self
      .core
      .pdf_gradient(&self.to_unit(x), self.settings.finite_difference_step)?;
    gradient.extend(core.iter().map(|g| g * product));
    Ok(Array1::from(gradient))
  }

  /// Gradient of the CDF with respect to `parameters()`.
  pub fn cdf_gradient(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
    self.check_point(x)?;
    let cdfs: Vec<f64> = (0..x.len()).map(|i| self.components[i].cdf(x[i])).collect();
    let mut gradient = Vec::with_capacity(self.parameters().len());

    for (i, component) in self.components.iter().enumerate() {
      let part = if self.is_independent() {
        let others: f64 = cdfs
          .iter()
          .enumerate()
          .filter(|&(j, _)| j != i)
          .map(|(_, f)| f)
          .product();
        component.cdf_gradient(x[i])? * others
      } else {
        central_difference(
          &component.parameters(),
          self.settings.finite_difference_step,
          |p| self.cdf_with_component(i, component.with_parameters(p)?.as_ref(), x),
        )?
      };
      gradient.extend(part.iter());
    }

    let core = self
      .core
      .cdf_gradient(&self.to_unit(x), self.settings.finite_difference_step)?;
    gradient.extend(core.iter());
    Ok(Array1::from(gradient))
  }

  pub fn mean(&self) -> Array1<f64> {
    self
      .moments
      .mean
      .get_or_init(|| self.components.iter().map(|c| c.mean()).collect())
      .clone()
  }

  pub fn standard_deviation(&self) -> Array1<f64> {
    self.components.iter().map(|c| c.std_dev()).collect()
  }

  /// Memoised covariance matrix.
  pub fn covariance(&self) -> Result<Array2<f64>> {
    if let Some(cached) = self.moments.covariance.get() {
      return Ok(cached.clone());
    }
    let computed = self.compute_covariance()?;
    Ok(self.moments.covariance.get_or_init(|| computed).clone())
  }

  /// Pearson correlation derived from the covariance.
  pub fn correlation(&self) -> Result<Array2<f64>> {
    let cov = self.covariance()?;
    let sd = cov.diag().mapv(f64::sqrt);
    let d = self.dimension();
    Ok(Array2::from_shape_fn((d, d), |(i, j)| {
      if i == j {
        1.0
      } else {
        cov[[i, j]] / (sd[i] * sd[j])
      }
    }))
  }

  /// Kendall's tau, invariant under the monotone component maps.
  pub fn kendall_tau(&self) -> Result<Array2<f64>> {
    self.core.kendall_tau()
  }

  /// Component parameters in order, then the dependence structure's.
  pub fn parameters(&self) -> Vec<f64> {
    self
      .components
      .iter()
      .flat_map(|c| c.parameters())
      .chain(self.core.parameters())
      .collect()
  }

  pub fn parameter_description(&self) -> Vec<String> {
    self
      .components
      .iter()
      .enumerate()
      .flat_map(|(i, c)| {
        c.parameter_names()
          .into_iter()
          .map(move |name| format!("{name}_marginal_{i}"))
      })
      .chain(
        self
          .core
          .parameter_names()
          .into_iter()
          .map(|name| format!("{name}_copula")),
      )
      .collect()
  }

  pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
    check_dimension(self.parameters().len(), parameters.len(), "parameter vector")?;
    let mut rest = parameters;
    let mut components = Vec::with_capacity(self.components.len());
    for c in &self.components {
      let (head, tail) = rest.split_at(c.parameters().len());
      components.push(c.with_parameters(head)?);
      rest = tail;
    }
    let core = self.core.with_parameters(rest)?;
    self.set_components(components)?;
    self.set_core(core)
  }

  pub fn marginal_component(&self, i: usize) -> Result<Arc<dyn UnivariateExt>> {
    match self.components.get(i) {
      Some(c) => Ok(c.clone()),
      None => invalid(format!(
        "component index {i} out of range for dimension {}",
        self.dimension()
      )),
    }
  }

  /// Marginal over `indices`: the bare component for a single index of a
  /// genuine copula, a joint distribution otherwise.
  pub fn marginal(&self, indices: &[usize]) -> Result<MarginalDistribution> {
    let core = self.core.marginal(indices)?;
    if indices.len() == 1 && self.core.is_copula() {
      return Ok(MarginalDistribution::Component(
        self.components[indices[0]].clone(),
      ));
    }
    let components = indices.iter().map(|&i| self.components[i].clone()).collect();
    Ok(MarginalDistribution::Joint(
      JointDistribution::new(components, core)?.with_settings(self.settings),
    ))
  }

  pub fn realization(&self) -> Result<Array1<f64>> {
    Ok(self.sample(1)?.row(0).to_owned())
  }

  /// Sample drawn through the inverse Rosenblatt map of uniform vectors.
  pub fn sample_by_conditional_inversion(&self, n: usize) -> Result<Array2<f64>> {
    let d = self.dimension();
    let uniforms = Core::independent(d)?.sample(n)?;
    let mut out = Array2::<f64>::zeros((n, d));
    for (q, mut row) in uniforms.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
      row.assign(&self.sequential_conditional_quantile(&q.to_owned())?);
    }
    Ok(out)
  }
}

impl MultivariateExt for JointDistribution {
  fn dimension(&self) -> usize {
    JointDistribution::dimension(self)
  }

  fn pdf(&self, x: &Array1<f64>) -> Result<f64> {
    JointDistribution::pdf(self, x)
  }

  fn cdf(&self, x: &Array1<f64>) -> Result<f64> {
    JointDistribution::cdf(self, x)
  }

  fn marginal_component(&self, i: usize) -> Result<Arc<dyn UnivariateExt>> {
    JointDistribution::marginal_component(self, i)
  }

  fn marginal_distribution(&self, indices: &[usize]) -> Result<Arc<dyn MultivariateExt>> {
    let joint = match self.marginal(indices)? {
      MarginalDistribution::Component(c) => JointDistribution::independent(vec![c])?,
      MarginalDistribution::Joint(j) => j,
    };
    Ok(Arc::new(joint))
  }

  fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    JointDistribution::conditional_pdf(self, x, y)
  }

  fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    JointDistribution::conditional_cdf(self, x, y)
  }

  fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    JointDistribution::conditional_quantile(self, q, y)
  }

  fn sample(&self, n: usize) -> Result<Array2<f64>> {
    JointDistribution::sample(self, n)
  }

  fn has_independent_copula(&self) -> bool {
    self.is_independent()
  }

  fn elliptical_copula(&self) -> Option<(EllipticalFamily, Array2<f64>)> {
    self.core.elliptical_shape()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;
  use crate::error::Error;
  use crate::marginals::Exponential;
  use crate::marginals::Normal;
  use crate::marginals::Uniform;

  fn uniforms(d: usize) -> Vec<Arc<dyn UnivariateExt>> {
    (0..d)
      .map(|_| Arc::new(Uniform::new(0.0, 1.0).unwrap()) as Arc<dyn UnivariateExt>)
      .collect()
  }

  fn mixed(rho: f64) -> JointDistribution {
    JointDistribution::new(
      vec![
        Arc::new(Normal::new(1.0, 2.0).unwrap().with_description("x")),
        Arc::new(Exponential::new(1.5).unwrap().with_description("y")),
      ],
      Core::normal(array![[1.0, rho], [rho, 1.0]]).unwrap(),
    )
    .unwrap()
  }

  #[test]
  fn independent_uniform_cdf_is_the_product() {
    let joint = JointDistribution::independent(uniforms(2)).unwrap();
    assert_abs_diff_eq!(joint.cdf(&array![0.3, 0.4]).unwrap(), 0.12, epsilon = 1e-15);
    assert_abs_diff_eq!(joint.survival(&array![0.3, 0.4]).unwrap(), 0.42, epsilon = 1e-15);
  }

  #[test]
  fn cdf_goes_through_the_core() {
    let joint = mixed(0.4);
    let x = array![0.5, 0.8];
    let u = joint.to_unit(&x);
    assert_abs_diff_eq!(
      joint.cdf(&x).unwrap(),
      joint.core().cdf(&u).unwrap(),
      epsilon = 1e-15
    );
  }

  #[test]
  fn pdf_is_copula_density_times_marginals() {
    let joint = mixed(-0.3);
    let x = array![2.0, 0.1];
    let u = joint.to_unit(&x);
    let expected = joint.core().pdf(&u).unwrap()
      * joint.components()[0].pdf(2.0)
      * joint.components()[1].pdf(0.1);
    assert_abs_diff_eq!(joint.pdf(&x).unwrap(), expected, epsilon = 1e-14);
    assert_abs_diff_eq!(joint.log_pdf(&x).unwrap(), expected.ln(), epsilon = 1e-12);
  }

  #[test]
  fn survival_and_box_probability_by_inclusion_exclusion() {
    let joint = mixed(0.6);
    let x = array![1.0, 0.5];
    let inf = array![f64::INFINITY, f64::INFINITY];
    let fx = joint.cdf(&x).unwrap();
    let f0 = joint.components()[0].cdf(1.0);
    let f1 = joint.components()[1].cdf(0.5);
    assert_abs_diff_eq!(
      joint.survival(&x).unwrap(),
      1.0 - f0 - f1 + fx,
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(
      joint.probability(&x, &inf).unwrap(),
      joint.survival(&x).unwrap(),
      epsilon = 1e-12
    );
    assert_eq!(joint.probability(&inf, &x).unwrap(), 0.0);
  }

  #[test]
  fn inclusion_exclusion_is_refused_above_the_dimension_limit() {
    let d = MAX_INCLUSION_EXCLUSION_DIMENSION + 1;
    let r = Array2::from_shape_fn((d, d), |(i, j)| if i == j { 1.0 } else { 0.2 });
    let joint = JointDistribution::new(uniforms(d), Core::normal(r).unwrap()).unwrap();
    let x = Array1::from_elem(d, 0.5);
    let upper = Array1::from_elem(d, 0.9);
    assert!(joint.survival(&x).unwrap_err().is_invalid_argument());
    assert!(joint.probability(&x, &upper).unwrap_err().is_invalid_argument());

    // The product form has no vertex expansion.
    let flat = JointDistribution::independent(uniforms(d)).unwrap();
    assert_abs_diff_eq!(flat.survival(&x).unwrap(), 0.5f64.powi(d as i32), epsilon = 1e-15);
    assert_abs_diff_eq!(
      flat.probability(&x, &upper).unwrap(),
      0.4f64.powi(d as i32),
      epsilon = 1e-12
    );
  }

  #[test]
  fn conditional_chain_round_trips() {
    let joint = mixed(0.5);
    let x = array![0.3, 1.1];
    let v = joint.sequential_conditional_cdf(&x).unwrap();
    let back = joint.sequential_conditional_quantile(&v).unwrap();
    assert_abs_diff_eq!(back[0], x[0], epsilon = 1e-9);
    assert_abs_diff_eq!(back[1], x[1], epsilon = 1e-9);
  }

  #[test]
  fn wrong_dimensions_are_invalid_arguments() {
    let joint = mixed(0.2);
    assert!(joint.pdf(&array![1.0]).unwrap_err().is_invalid_argument());
    assert!(joint
      .conditional_cdf(0.1, &array![1.0, 2.0])
      .unwrap_err()
      .is_invalid_argument());
    assert!(joint.quantile(1.2).unwrap_err().is_invalid_argument());
    assert!(matches!(
      JointDistribution::new(uniforms(3), Core::independent(2).unwrap()),
      Err(Error::InvalidArgument(_))
    ));
  }

  #[test]
  fn quantile_of_independent_uniforms() {
    let joint = JointDistribution::independent(uniforms(2)).unwrap();
    let q = joint.quantile(0.25).unwrap();
    assert_abs_diff_eq!(q[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(joint.cdf(&q).unwrap(), 0.25, epsilon = 1e-12);
  }

  #[test]
  #[traced_test]
  fn duplicate_descriptions_are_renamed() {
    let joint = JointDistribution::independent(uniforms(3)).unwrap();
    assert_eq!(joint.description(), &["X0", "X0_1", "X0_2"]);
    assert!(logs_contain("renaming duplicate description"));
  }

  #[test]
  fn parameters_are_flattened_with_descriptions() {
    let mut joint = mixed(0.2);
    assert_eq!(joint.parameters(), vec![1.0, 2.0, 1.5, 0.2]);
    assert_eq!(
      joint.parameter_description(),
      vec![
        "mu_marginal_0",
        "sigma_marginal_0",
        "lambda_marginal_1",
        "R_1_0_copula"
      ]
    );
    joint.set_parameters(&[0.0, 1.0, 2.0, -0.5]).unwrap();
    assert_eq!(joint.components()[1].parameters(), vec![2.0]);
    assert_eq!(joint.core().shape_matrix().unwrap()[[0, 1]], -0.5);
    assert!(joint.set_parameters(&[0.0]).is_err());
  }

  #[test]
  fn pdf_gradient_matches_finite_differences_of_the_joint() {
    let joint = mixed(0.3);
    let x = array![0.7, 0.4];
    let g = joint.pdf_gradient(&x).unwrap();
    let p = joint.parameters();
    for k in 0..p.len() {
      let h = 1e-5;
      let mut plus = joint.clone();
      let mut minus = joint.clone();
      let mut pp = p.clone();
      pp[k] += h;
      plus.set_parameters(&pp).unwrap();
      pp[k] -= 2.0 * h;
      minus.set_parameters(&pp).unwrap();
      let fd = (plus.pdf(&x).unwrap() - minus.pdf(&x).unwrap()) / (2.0 * h);
      assert_abs_diff_eq!(g[k], fd, epsilon = 1e-6);
    }
  }

  #[test]
  fn independent_gradient_is_analytic() {
    let joint = JointDistribution::independent(vec![
      Arc::new(Normal::new(0.0, 1.0).unwrap()),
      Arc::new(Normal::new(1.0, 2.0).unwrap()),
    ])
    .unwrap();
    let x = array![0.3, -0.2];
    let g = joint.cdf_gradient(&x).unwrap();
    let f1 = joint.components()[1].cdf(-0.2);
    // d/dmu of Phi((x - mu) / sigma) is -pdf.
    assert_abs_diff_eq!(g[0], -joint.components()[0].pdf(0.3) * f1, epsilon = 1e-12);
    assert_eq!(g.len(), 4);
  }

  #[test]
  fn single_index_marginal_is_the_component() {
    let joint = mixed(0.4);
    let m = joint.marginal(&[1]).unwrap();
    assert_eq!(m.as_component().unwrap().description(), "y");
    let pair = joint.marginal(&[1, 0]).unwrap();
    let pair = pair.as_joint().unwrap();
    assert_eq!(pair.description(), &["y", "x"]);
    assert_abs_diff_eq!(
      pair.cdf(&array![0.8, 0.5]).unwrap(),
      joint.cdf(&array![0.5, 0.8]).unwrap(),
      epsilon = 1e-12
    );
  }

  #[test]
  fn mutators_reset_the_memoised_moments() {
    let mut joint = mixed(0.4);
    let before = joint.covariance().unwrap();
    joint.set_core(Core::normal(array![[1.0, -0.4], [-0.4, 1.0]]).unwrap()).unwrap();
    let after = joint.covariance().unwrap();
    assert!(before[[0, 1]] > 0.0);
    assert!(after[[0, 1]] < 0.0);
    assert_eq!(joint.mean()[0], 1.0);
  }

  #[test]
  fn box_probability_of_a_student_copula_is_positive() {
    let joint = JointDistribution::new(
      uniforms(2),
      Core::student(4.0, array![[1.0, 0.7], [0.7, 1.0]]).unwrap(),
    )
    .unwrap();
    let p = joint
      .probability(&array![0.2, 0.2], &array![0.6, 0.6])
      .unwrap();
    assert!(p > 0.16);
    assert!(p < 0.4);
  }
}
