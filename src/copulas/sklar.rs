//! # Sklar
//!
//! $$
//! C(u)=G\big(G_1^{-1}(u_1),\dots,G_d^{-1}(u_d)\big),\qquad
//! c(u)=\frac{g(x)}{\prod_i g_i(x_i)}\Big|_{x_i=G_i^{-1}(u_i)}
//! $$
//!
//! Copula extracted from an arbitrary multivariate generator.
//!
use std::sync::Arc;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;

use super::independent::IndependentCopula;
use super::Core;
use crate::error::Result;
use crate::traits::EllipticalFamily;
use crate::traits::MultivariateExt;
use crate::traits::UnivariateExt;

#[derive(Debug, Clone)]
pub struct SklarCopula {
  generator: Arc<dyn MultivariateExt>,
  marginals: Vec<Arc<dyn UnivariateExt>>,
}

impl SklarCopula {
  pub fn new(generator: Arc<dyn MultivariateExt>) -> Result<Self> {
    let marginals = (0..generator.dimension())
      .map(|i| generator.marginal_component(i))
      .collect::<Result<Vec<_>>>()?;
    Ok(Self {
      generator,
      marginals,
    })
  }

  pub fn dimension(&self) -> usize {
    self.marginals.len()
  }

  pub fn generator(&self) -> &Arc<dyn MultivariateExt> {
    &self.generator
  }

  fn to_native(&self, u: &Array1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(u.len(), |i| self.marginals[i].quantile(u[i]))
  }

  pub fn pdf(&self, u: &Array1<f64>) -> Result<f64> {
    if u.iter().any(|&v| v <= 0.0 || v >= 1.0) {
      return Ok(0.0);
    }
    let x = self.to_native(u);
    let marginal_density: f64 = x
      .iter()
      .zip(&self.marginals)
      .map(|(&xi, m)| m.pdf(xi))
      .product();
    if marginal_density <= 0.0 {
      return Ok(0.0);
    }
    Ok(self.generator.pdf(&x)? / marginal_density)
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    let u = u.mapv(|v| v.clamp(0.0, 1.0));
    if u.iter().any(|&v| v <= 0.0) {
      return Ok(0.0);
    }
    self.generator.cdf(&self.to_native(&u))
  }

  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    if x <= 0.0 || x >= 1.0 {
      return Ok(0.0);
    }
    let i = y.len();
    let xi = self.marginals[i].quantile(x);
    let density = self.marginals[i].pdf(xi);
    if density <= 0.0 {
      return Ok(0.0);
    }
    Ok(self.generator.conditional_pdf(xi, &self.to_native(y))? / density)
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    if x <= 0.0 {
      return Ok(0.0);
    }
    if x >= 1.0 {
      return Ok(1.0);
    }
    let xi = self.marginals[y.len()].quantile(x);
    self.generator.conditional_cdf(xi, &self.to_native(y))
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    let xi = self.generator.conditional_quantile(q, &self.to_native(y))?;
    Ok(self.marginals[y.len()].cdf(xi))
  }

  pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
    let mut draws = self.generator.sample(n)?;
    for (mut column, m) in draws.axis_iter_mut(Axis(1)).zip(&self.marginals) {
      column.mapv_inplace(|x| m.cdf(x));
    }
    Ok(draws)
  }

  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    if indices.len() == 1 {
      return Ok(Core::Independent(IndependentCopula::new(1)?));
    }
    Ok(Core::SklarWrapped(Self::new(
      self.generator.marginal_distribution(indices)?,
    )?))
  }

  pub fn has_independent_copula(&self) -> bool {
    self.dimension() == 1 || self.generator.has_independent_copula()
  }

  pub fn elliptical_shape(&self) -> Option<(EllipticalFamily, Array2<f64>)> {
    self.generator.elliptical_copula()
  }

  pub fn description(&self) -> String {
    format!("SklarCopula(dimension={})", self.dimension())
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::joint::JointDistribution;
  use crate::marginals::Exponential;
  use crate::marginals::Normal;

  fn generator(rho: f64) -> Arc<dyn MultivariateExt> {
    let components: Vec<Arc<dyn UnivariateExt>> = vec![
      Arc::new(Normal::new(1.0, 2.0).unwrap()),
      Arc::new(Exponential::new(0.5).unwrap()),
    ];
    Arc::new(
      JointDistribution::new(
        components,
        Core::normal(array![[1.0, rho], [rho, 1.0]]).unwrap(),
      )
      .unwrap(),
    )
  }

  #[test]
  fn recovers_the_generator_copula() {
    let sklar = SklarCopula::new(generator(0.4)).unwrap();
    let normal = Core::normal(array![[1.0, 0.4], [0.4, 1.0]]).unwrap();
    let u = array![0.3, 0.85];
    assert_abs_diff_eq!(sklar.cdf(&u).unwrap(), normal.cdf(&u).unwrap(), epsilon = 1e-9);
    assert_abs_diff_eq!(sklar.pdf(&u).unwrap(), normal.pdf(&u).unwrap(), epsilon = 1e-9);
    assert_abs_diff_eq!(
      sklar.conditional_cdf(0.6, &array![0.2]).unwrap(),
      normal.conditional_cdf(0.6, &array![0.2]).unwrap(),
      epsilon = 1e-9
    );
  }

  #[test]
  fn exposes_the_generator_shape() {
    let sklar = SklarCopula::new(generator(-0.2)).unwrap();
    let (family, shape) = sklar.elliptical_shape().unwrap();
    assert_eq!(family, EllipticalFamily::Normal);
    assert_eq!(shape[[0, 1]], -0.2);
    assert!(!sklar.has_independent_copula());
  }

  #[test]
  fn samples_are_uniform_scores() {
    let sklar = SklarCopula::new(generator(0.7)).unwrap();
    let s = sklar.sample(1000).unwrap();
    assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_abs_diff_eq!(s.column(1).mean().unwrap(), 0.5, epsilon = 0.05);
  }
}
