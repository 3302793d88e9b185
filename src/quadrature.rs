//! # Quadrature
//!
//! $$
//! \int_a^b f(t)\,dt\approx(b-a)\sum_{k=1}^n w_k f\big(a+(b-a)t_k\big),\qquad t_k\in(0,1)
//! $$
//!
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use gauss_quad::GaussLegendre;

use crate::error::Error;
use crate::error::Result;

/// Gauss-Legendre rule remapped from [-1, 1] to [0, 1]; weights sum to one.
#[derive(Debug, Clone)]
pub struct UnitRule {
  pub nodes: Vec<f64>,
  pub weights: Vec<f64>,
}

static RULES: OnceLock<Mutex<HashMap<usize, Arc<UnitRule>>>> = OnceLock::new();

/// Shared `n`-point rule on [0, 1].
pub fn unit_rule(n: usize) -> Result<Arc<UnitRule>> {
  let rules = RULES.get_or_init(|| Mutex::new(HashMap::new()));
  if let Ok(cache) = rules.lock() {
    if let Some(rule) = cache.get(&n) {
      return Ok(rule.clone());
    }
  }

  let quad = GaussLegendre::new(n)
    .map_err(|e| Error::Numerical(format!("Gauss-Legendre rule of size {n}: {e}")))?;
  let (nodes, weights): (Vec<f64>, Vec<f64>) = quad
    .iter()
    .map(|&(x, w)| (0.5 * (x + 1.0), 0.5 * w))
    .unzip();
  let rule = Arc::new(UnitRule { nodes, weights });

  if let Ok(mut cache) = rules.lock() {
    cache.insert(n, rule.clone());
  }
  Ok(rule)
}

impl UnitRule {
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn integrate<F>(&self, a: f64, b: f64, mut f: F) -> f64
  where
    F: FnMut(f64) -> f64,
  {
    let h = b - a;
    self
      .nodes
      .iter()
      .zip(&self.weights)
      .map(|(&t, &w)| w * f(a + h * t))
      .sum::<f64>()
      * h
  }

  pub fn try_integrate<F>(&self, a: f64, b: f64, mut f: F) -> Result<f64>
  where
    F: FnMut(f64) -> Result<f64>,
  {
    let h = b - a;
    let mut acc = 0.0;
    for (&t, &w) in self.nodes.iter().zip(&self.weights) {
      acc += w * f(a + h * t)?;
    }
    Ok(acc * h)
  }
}
