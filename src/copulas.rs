//! # Copulas
//!
//! $$
//! F_{X_1,\dots,X_d}(x)=C\left(F_1(x_1),\dots,F_d(x_d)\right)
//! $$
//!
//! Dependence structures on the unit hypercube. `Core` is a closed sum of the
//! supported structures; every operation dispatches on the variant.
//!
pub mod block;
pub mod correlation;
pub mod elliptical;
pub mod independent;
pub mod marginal;
pub mod ordinal_sum;
pub mod sklar;

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;

use self::block::BlockComposedCopula;
use self::elliptical::EllipticalCopula;
use self::independent::IndependentCopula;
use self::marginal::MarginalCopula;
use self::ordinal_sum::OrdinalSumCopula;
use self::sklar::SklarCopula;
use crate::conditional::diagonal_quantile;
use crate::error::check_dimension;
use crate::error::check_probability;
use crate::error::invalid;
use crate::error::Error;
use crate::error::Result;
use crate::linalg::select;
use crate::traits::EllipticalFamily;
use crate::traits::MultivariateExt;

/// Dependence structure of a joint distribution.
#[derive(Debug, Clone)]
pub enum Core {
  Independent(IndependentCopula),
  Elliptical(EllipticalCopula),
  BlockComposed(BlockComposedCopula),
  OrdinalSum(OrdinalSumCopula),
  SklarWrapped(SklarCopula),
  /// Generic extraction over an index subset.
  Marginal(MarginalCopula),
}

impl Core {
  pub fn independent(dimension: usize) -> Result<Self> {
    Ok(Core::Independent(IndependentCopula::new(dimension)?))
  }

  pub fn normal(correlation: Array2<f64>) -> Result<Self> {
    Ok(Core::Elliptical(EllipticalCopula::normal(correlation)?))
  }

  pub fn student(nu: f64, correlation: Array2<f64>) -> Result<Self> {
    Ok(Core::Elliptical(EllipticalCopula::student(nu, correlation)?))
  }

  pub fn block_composed(blocks: Vec<Core>) -> Result<Self> {
    Ok(Core::BlockComposed(BlockComposedCopula::new(blocks)?))
  }

  /// `interior` are the `n - 1` bounds strictly inside (0, 1) for `n` blocks.
  pub fn ordinal_sum(blocks: Vec<Core>, interior: &[f64]) -> Result<Self> {
    Ok(Core::OrdinalSum(OrdinalSumCopula::new(blocks, interior)?))
  }

  pub fn sklar(generator: Arc<dyn MultivariateExt>) -> Result<Self> {
    Ok(Core::SklarWrapped(SklarCopula::new(generator)?))
  }

  pub fn dimension(&self) -> usize {
    match self {
      Core::Independent(c) => c.dimension(),
      Core::Elliptical(c) => c.dimension(),
      Core::BlockComposed(c) => c.dimension(),
      Core::OrdinalSum(c) => c.dimension(),
      Core::SklarWrapped(c) => c.dimension(),
      Core::Marginal(c) => c.dimension(),
    }
  }

  pub fn pdf(&self, u: &Array1<f64>) -> Result<f64> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Independent(c) => Ok(c.pdf(u)),
      Core::Elliptical(c) => Ok(c.pdf(u)),
      Core::BlockComposed(c) => c.pdf(u),
      Core::OrdinalSum(c) => c.pdf(u),
      Core::SklarWrapped(c) => c.pdf(u),
      Core::Marginal(c) => c.pdf(u),
    }
  }

  pub fn log_pdf(&self, u: &Array1<f64>) -> Result<f64> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Elliptical(c) => Ok(c.log_pdf(u)),
      Core::BlockComposed(c) => c.log_pdf(u),
      _ => Ok(self.pdf(u)?.ln()),
    }
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Independent(c) => Ok(c.cdf(u)),
      Core::Elliptical(c) => c.cdf(u),
      Core::BlockComposed(c) => c.cdf(u),
      Core::OrdinalSum(c) => c.cdf(u),
      Core::SklarWrapped(c) => c.cdf(u),
      Core::Marginal(c) => c.cdf(u),
    }
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

  /// Density of coordinate `y.len()` given the preceding coordinates `y`.
  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    match self {
      Core::Independent(c) => Ok(c.conditional_pdf(x)),
      Core::Elliptical(c) => c.conditional_pdf(x, y),
      Core::BlockComposed(c) => c.conditional_pdf(x, y),
      Core::OrdinalSum(c) => c.conditional_pdf(x, y),
      Core::SklarWrapped(c) => c.conditional_pdf(x, y),
      Core::Marginal(c) => c.conditional_pdf(x, y),
    }
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    match self {
      Core::Independent(c) => Ok(c.conditional_cdf(x)),
      Core::Elliptical(c) => c.conditional_cdf(x, y),
      Core::BlockComposed(c) => c.conditional_cdf(x, y),
      Core::OrdinalSum(c) => c.conditional_cdf(x, y),
      Core::SklarWrapped(c) => c.conditional_cdf(x, y),
      Core::Marginal(c) => c.conditional_cdf(x, y),
    }
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    check_probability(q)?;
    match self {
      Core::Independent(c) => Ok(c.conditional_quantile(q)),
      Core::Elliptical(c) => c.conditional_quantile(q, y),
      Core::BlockComposed(c) => c.conditional_quantile(q, y),
      Core::OrdinalSum(c) => c.conditional_quantile(q, y),
      Core::SklarWrapped(c) => c.conditional_quantile(q, y),
      Core::Marginal(c) => c.conditional_quantile(q, y),
    }
  }

  /// `[c(u_0), c(u_1 | u_0), ..., c(u_{d-1} | u_0..u_{d-2})]`.
  pub fn sequential_conditional_pdf(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), u.len(), "point")?;
    if let Core::Independent(c) = self {
      return Ok(u.mapv(|x| c.conditional_pdf(x)));
    }
    let mut out = Array1::<f64>::zeros(u.len());
    for i in 0..u.len() {
      out[i] = self.conditional_pdf(u[i], &u.slice(s![..i]).to_owned())?;
    }
    Ok(out)
  }

  /// Rosenblatt map of `u` onto independent uniforms.
  pub fn sequential_conditional_cdf(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), u.len(), "point")?;
    if let Core::Independent(c) = self {
      return Ok(u.mapv(|x| c.conditional_cdf(x)));
    }
    let mut out = Array1::<f64>::zeros(u.len());
    for i in 0..u.len() {
      out[i] = self.conditional_cdf(u[i], &u.slice(s![..i]).to_owned())?;
    }
    Ok(out)
  }

  /// Inverse Rosenblatt map: each coordinate is the conditional quantile
  /// given the coordinates already produced.
  pub fn sequential_conditional_quantile(&self, q: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), q.len(), "probability vector")?;
    let mut out = Array1::<f64>::zeros(q.len());
    for i in 0..q.len() {
      out[i] = self.conditional_quantile(q[i], &out.slice(s![..i]).to_owned())?;
    }
    Ok(out)
  }

  /// Structure of the coordinates `indices`, in the given order.
  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    let d = self.dimension();
    if indices.is_empty() {
      return invalid("marginal needs at least one index");
    }
    if let Some(&bad) = indices.iter().find(|&&i| i >= d) {
      return invalid(format!("marginal index {bad} out of range for dimension {d}"));
    }
    let mut seen = vec![false; d];
    for &i in indices {
      if std::mem::replace(&mut seen[i], true) {
        return invalid(format!("marginal index {i} is repeated"));
      }
    }
    if indices.iter().copied().eq(0..d) {
      return Ok(self.clone());
    }
    if indices.len() == 1 && self.is_copula() {
      return Ok(Core::Independent(IndependentCopula::new(1)?));
    }

    match self {
      Core::Independent(_) => Core::independent(indices.len()),
      Core::Elliptical(c) => c.marginal(indices),
      Core::BlockComposed(c) => c.marginal(indices),
      Core::OrdinalSum(c) => c.marginal(indices),
      Core::SklarWrapped(c) => c.marginal(indices),
      Core::Marginal(c) => c.marginal(indices),
    }
  }

  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    match self {
      Core::Independent(c) => Ok(c.sample(n)),
      Core::Elliptical(c) => Ok(c.sample(n)),
      Core::BlockComposed(c) => c.sample(n),
      Core::OrdinalSum(c) => c.sample(n),
      Core::SklarWrapped(c) => c.sample(n),
      Core::Marginal(c) => c.sample(n),
    }
  }

  pub fn realization(&self) -> Result<Array1<f64>> {
    Ok(self.sample(1)?.row(0).to_owned())
  }

  /// Diagonal point `(t, ..., t)` whose CDF equals `p`.
  pub fn scalar_quantile(&self, p: f64) -> Result<Array1<f64>> {
    check_probability(p)?;
    match self {
      Core::Independent(c) => Ok(c.scalar_quantile(p)),
      _ => diagonal_quantile(p, self.dimension(), |u| self.cdf(u)),
    }
  }

  pub fn is_copula(&self) -> bool {
    match self {
      Core::BlockComposed(c) => c.is_copula(),
      Core::Marginal(c) => c.parent().is_copula(),
      _ => true,
    }
  }

  pub fn has_independent_copula(&self) -> bool {
    match self {
      Core::Independent(_) => true,
      Core::Elliptical(c) => {
        c.family() == EllipticalFamily::Normal && *c.correlation() == Array2::eye(c.dimension())
      }
      Core::BlockComposed(c) => c.has_independent_copula(),
      Core::OrdinalSum(c) => c.has_independent_copula(),
      Core::SklarWrapped(c) => c.has_independent_copula(),
      Core::Marginal(c) => c.has_independent_copula(),
    }
  }

  /// Family and shape matrix when the structure is an elliptical copula.
  pub fn elliptical_shape(&self) -> Option<(EllipticalFamily, Array2<f64>)> {
    match self {
      Core::Independent(c) => Some((EllipticalFamily::Normal, Array2::eye(c.dimension()))),
      Core::Elliptical(c) => Some((c.family(), c.correlation().clone())),
      Core::BlockComposed(c) => c.elliptical_shape(),
      Core::OrdinalSum(c) => match c.blocks() {
        [only] => only.elliptical_shape(),
        _ => None,
      },
      Core::SklarWrapped(c) => c.elliptical_shape(),
      Core::Marginal(c) => c
        .parent()
        .elliptical_shape()
        .map(|(family, r)| (family, select(&r, c.indices()))),
    }
  }

  pub fn has_elliptical_copula(&self) -> bool {
    self.elliptical_shape().is_some()
  }

  pub fn elliptical_family(&self) -> Option<EllipticalFamily> {
    self.elliptical_shape().map(|(family, _)| family)
  }

  /// Shape (correlation) matrix of an elliptical structure.
  pub fn shape_matrix(&self) -> Result<Array2<f64>> {
    self
      .elliptical_shape()
      .map(|(_, r)| r)
      .ok_or_else(|| Error::InvalidArgument(format!("{} is not elliptical", self.description())))
  }

  /// True when the structure maps itself onto iid standard normals without
  /// the sequential conditional chain.
  pub fn has_own_transform(&self) -> bool {
    match self {
      Core::Independent(_) => true,
      Core::Elliptical(c) => c.family() == EllipticalFamily::Normal,
      Core::BlockComposed(c) => c.has_own_transform(),
      _ => false,
    }
  }

  pub fn own_transform(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Independent(c) => Ok(c.transform(u)),
      Core::Elliptical(c) if self.has_own_transform() => Ok(c.transform(u)),
      Core::BlockComposed(c) if c.has_own_transform() => c.own_transform(u),
      _ => Err(Error::NotYetImplemented(format!(
        "own transform of {}",
        self.description()
      ))),
    }
  }

  pub fn own_inverse_transform(&self, z: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), z.len(), "point")?;
    match self {
      Core::Independent(c) => Ok(c.inverse_transform(z)),
      Core::Elliptical(c) if self.has_own_transform() => Ok(c.inverse_transform(z)),
      Core::BlockComposed(c) if c.has_own_transform() => c.own_inverse_transform(z),
      _ => Err(Error::NotYetImplemented(format!(
        "own inverse transform of {}",
        self.description()
      ))),
    }
  }

  pub fn parameters(&self) -> Vec<f64> {
    match self {
      Core::Independent(_) | Core::SklarWrapped(_) => Vec::new(),
      Core::Elliptical(c) => c.parameters(),
      Core::BlockComposed(c) => c.parameters(),
      Core::OrdinalSum(c) => c.parameters(),
      Core::Marginal(c) => c.parent().parameters(),
    }
  }

  pub fn parameter_names(&self) -> Vec<String> {
    match self {
      Core::Independent(_) | Core::SklarWrapped(_) => Vec::new(),
      Core::Elliptical(c) => c.parameter_names(),
      Core::BlockComposed(c) => c.parameter_names(),
      Core::OrdinalSum(c) => c.parameter_names(),
      Core::Marginal(c) => c.parent().parameter_names(),
    }
  }

  pub fn with_parameters(&self, parameters: &[f64]) -> Result<Core> {
    check_dimension(self.parameters().len(), parameters.len(), "parameter vector")?;
    match self {
      Core::Independent(_) | Core::SklarWrapped(_) => Ok(self.clone()),
      Core::Elliptical(c) => Ok(Core::Elliptical(c.with_parameters(parameters)?)),
      Core::BlockComposed(c) => Ok(Core::BlockComposed(c.with_parameters(parameters)?)),
      Core::OrdinalSum(c) => Ok(Core::OrdinalSum(c.with_parameters(parameters)?)),
      Core::Marginal(c) => Ok(Core::Marginal(MarginalCopula::new(
        c.parent().with_parameters(parameters)?,
        c.indices().to_vec(),
      )?)),
    }
  }

  /// Gradient of the density with respect to `parameters()`.
  pub fn pdf_gradient(&self, u: &Array1<f64>, step: f64) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Independent(_) | Core::SklarWrapped(_) => Ok(Array1::zeros(0)),
      Core::Elliptical(c) => c.pdf_gradient(u, step),
      _ => Err(Error::NotYetImplemented(format!(
        "pdf gradient of {}",
        self.description()
      ))),
    }
  }

  pub fn cdf_gradient(&self, u: &Array1<f64>, step: f64) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), u.len(), "point")?;
    match self {
      Core::Independent(_) | Core::SklarWrapped(_) => Ok(Array1::zeros(0)),
      Core::Elliptical(c) => c.cdf_gradient(u, step),
      _ => Err(Error::NotYetImplemented(format!(
        "cdf gradient of {}",
        self.description()
      ))),
    }
  }

  pub fn kendall_tau(&self) -> Result<Array2<f64>> {
    match self {
      Core::Independent(c) => Ok(c.kendall_tau()),
      Core::Elliptical(c) => Ok(c.kendall_tau()),
      Core::BlockComposed(c) => c.kendall_tau(),
      Core::OrdinalSum(c) => match c.blocks() {
        [only] => only.kendall_tau(),
        _ => Err(Error::NotYetImplemented(format!(
          "Kendall tau of {}",
          self.description()
        ))),
      },
      Core::SklarWrapped(c) => c
        .elliptical_shape()
        .map(|(_, r)| r.mapv(|v| 2.0 / PI * v.asin()))
        .ok_or_else(|| Error::NotYetImplemented(format!("Kendall tau of {}", c.description()))),
      Core::Marginal(c) => c.kendall_tau(),
    }
  }

  /// False when sampling goes through an opaque generator that owns its draws.
  pub fn supports_batch_sampling(&self) -> bool {
    match self {
      Core::SklarWrapped(_) => false,
      Core::BlockComposed(c) => c.supports_batch_sampling(),
      Core::OrdinalSum(c) => c.supports_batch_sampling(),
      Core::Marginal(c) => c.parent().supports_batch_sampling(),
      _ => true,
    }
  }

  pub fn description(&self) -> String {
    match self {
      Core::Independent(c) => format!("IndependentCopula(dimension={})", c.dimension()),
      Core::Elliptical(c) => {
        let r: Vec<f64> = c.correlation().iter().copied().collect();
        match c.family() {
          EllipticalFamily::Normal => format!("NormalCopula(R={r:?})"),
          EllipticalFamily::Student { nu } => format!("StudentCopula(nu={nu}, R={r:?})"),
        }
      }
      Core::BlockComposed(c) => c.description(),
      Core::OrdinalSum(c) => c.description(),
      Core::SklarWrapped(c) => c.description(),
      Core::Marginal(c) => c.description(),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn single_block_ordinal_sum_matches_its_block() {
    let inner = Core::normal(array![[1.0, 0.3], [0.3, 1.0]]).unwrap();
    let sum = Core::ordinal_sum(vec![inner.clone()], &[]).unwrap();
    let u = array![0.25, 0.6];
    assert_abs_diff_eq!(sum.cdf(&u).unwrap(), inner.cdf(&u).unwrap(), epsilon = 1e-14);
    assert_abs_diff_eq!(sum.pdf(&u).unwrap(), inner.pdf(&u).unwrap(), epsilon = 1e-14);
  }

  #[test]
  fn rosenblatt_map_round_trips() {
    let c = Core::student(
      4.0,
      array![[1.0, 0.5, 0.2], [0.5, 1.0, 0.1], [0.2, 0.1, 1.0]],
    )
    .unwrap();
    let u = array![0.2, 0.9, 0.45];
    let v = c.sequential_conditional_cdf(&u).unwrap();
    let back = c.sequential_conditional_quantile(&v).unwrap();
    for i in 0..3 {
      assert_abs_diff_eq!(back[i], u[i], epsilon = 1e-6);
    }
  }

  #[test]
  fn prefix_of_full_length_is_rejected() {
    let c = Core::independent(2).unwrap();
    let err = c.conditional_cdf(0.5, &array![0.1, 0.2]).unwrap_err();
    assert!(err.is_invalid_argument());
  }

  #[test]
  fn marginal_validates_indices() {
    let c = Core::independent(3).unwrap();
    assert!(c.marginal(&[]).is_err());
    assert!(c.marginal(&[3]).is_err());
    assert!(c.marginal(&[1, 1]).is_err());
    assert_eq!(c.marginal(&[2, 0]).unwrap().dimension(), 2);
  }

  #[test]
  fn elliptical_marginal_keeps_the_sub_correlation() {
    let c = Core::normal(array![[1.0, 0.2, 0.4], [0.2, 1.0, 0.6], [0.4, 0.6, 1.0]]).unwrap();
    let m = c.marginal(&[2, 1]).unwrap();
    assert_eq!(m.shape_matrix().unwrap(), array![[1.0, 0.6], [0.6, 1.0]]);
    assert!(matches!(c.marginal(&[1]).unwrap(), Core::Independent(_)));
  }

  #[test]
  fn flags() {
    let normal = Core::normal(array![[1.0, 0.2], [0.2, 1.0]]).unwrap();
    assert!(normal.has_elliptical_copula());
    assert!(normal.has_own_transform());
    assert!(!normal.has_independent_copula());
    let uncorrelated = Core::normal(Array2::eye(2)).unwrap();
    assert!(uncorrelated.has_independent_copula());
    let student = Core::student(3.0, Array2::eye(2)).unwrap();
    assert!(!student.has_independent_copula());
    assert!(!student.has_own_transform());
  }

  #[test]
  fn gradients_of_unsupported_structures_are_not_implemented() {
    let c = Core::ordinal_sum(
      vec![Core::independent(2).unwrap(), Core::independent(2).unwrap()],
      &[0.5],
    )
    .unwrap();
    assert!(matches!(
      c.pdf_gradient(&array![0.2, 0.3], 1e-5),
      Err(Error::NotYetImplemented(_))
    ));
  }

  #[test]
  fn normal_copula_gradient_matches_closed_form_in_dimension_two() {
    // d/drho of the bivariate normal CDF at the median is 1 / (2 pi sqrt(1 - rho^2)).
    let rho: f64 = 0.3;
    let c = Core::normal(array![[1.0, rho], [rho, 1.0]]).unwrap();
    let g = c.cdf_gradient(&array![0.5, 0.5], 1e-5).unwrap();
    assert_abs_diff_eq!(g[0], 1.0 / (2.0 * PI * (1.0 - rho * rho).sqrt()), epsilon = 1e-5);
  }

  #[test]
  fn scalar_quantile_lies_on_the_diagonal() {
    let c = Core::normal(array![[1.0, 0.5], [0.5, 1.0]]).unwrap();
    let u = c.scalar_quantile(0.3).unwrap();
    assert_abs_diff_eq!(u[0], u[1]);
    assert_abs_diff_eq!(c.cdf(&u).unwrap(), 0.3, epsilon = 1e-9);
  }
}
