//! # Covariance
//!
//! $$
//! \operatorname{Cov}(X_i,X_j)=\int_0^1\!\!\int_0^1\big(F_i^{-1}(u)-\mu_i\big)\big(F_j^{-1}(v)-\mu_j\big)\,c_{ij}(u,v)\,du\,dv
//! $$
//!
//! Tensor Gauss-Legendre rule on the bivariate marginals of the dependence
//! structure. Pairs whose marginal copula is independent contribute zero.
//!
use ndarray::array;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use super::JointDistribution;
use crate::error::Result;
use crate::quadrature::unit_rule;

impl JointDistribution {
  pub(crate) fn compute_covariance(&self) -> Result<Array2<f64>> {
    let d = self.dimension();
    let sd = self.standard_deviation();
    let mut cov = Array2::<f64>::zeros((d, d));
    for i in 0..d {
      cov[[i, i]] = sd[i] * sd[i];
    }
    if self.is_independent() {
      return Ok(cov);
    }

    if self.is_elliptical() {
      let r = self.core.shape_matrix()?;
      for i in 0..d {
        for j in 0..i {
          cov[[i, j]] = r[[i, j]] * sd[i] * sd[j];
          cov[[j, i]] = cov[[i, j]];
        }
      }
      return Ok(cov);
    }

    let rule = unit_rule(self.settings.covariance_nodes_per_axis())?;
    let mean = self.mean();
    // centred[i][k] = F_i^{-1}(t_k) - mu_i
    let centred: Vec<Vec<f64>> = self
      .components
      .iter()
      .zip(mean.iter())
      .map(|(c, &mu)| rule.nodes.iter().map(|&t| c.quantile(t) - mu).collect())
      .collect();

    let pairs: Vec<(usize, usize)> = (0..d)
      .flat_map(|i| ((i + 1)..d).map(move |j| (i, j)))
      .collect();
    let entries = pairs
      .par_iter()
      .map(|&(i, j)| {
        let pair = self.core.marginal(&[i, j])?;
        if pair.has_independent_copula() {
          debug!(i, j, "skipping pair with independent copula");
          return Ok(0.0);
        }
        let mut acc = 0.0;
        for (k, (&uk, &wk)) in rule.nodes.iter().zip(&rule.weights).enumerate() {
          for (l, (&ul, &wl)) in rule.nodes.iter().zip(&rule.weights).enumerate() {
            let density = pair.pdf(&array![uk, ul])?;
            acc += wk * wl * centred[i][k] * centred[j][l] * density;
          }
        }
        Ok(acc)
      })
      .collect::<Result<Vec<f64>>>()?;

    for (&(i, j), value) in pairs.iter().zip(entries) {
      cov[[i, j]] = value;
      cov[[j, i]] = value;
    }
    Ok(cov)
  }
}
