//! # Elliptical
//!
//! $$
//! c(u)=\frac{h_d\!\left(z^\top R^{-1}z\right)}{\prod_{i=1}^d h_1(z_i^2)},\qquad z_i=G^{-1}(u_i),\quad R=LL^\top
//! $$
//!
//! Normal and Student copulas. Conditionals are closed form: with
//! `w = L^{-1} z` on the prefix, component `i` given the prefix is the kernel
//! law (Normal, or Student with `nu + i` degrees of freedom) with location
//! `sum_j L_ij w_j` and scale `L_ii` (times `sqrt((nu + |w|^2) / (nu + i))`
//! for Student).
//!
use std::f64::consts::PI;

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use rand::Rng;
use rand_distr::ChiSquared;
use rand_distr::StandardNormal;
use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;
use statrs::function::gamma::ln_gamma;

use super::independent::IndependentCopula;
use super::Core;
use crate::config::ELLIPTICAL_CDF_LATTICE_POINTS;
use crate::config::ELLIPTICAL_CDF_NODES;
use crate::error::check_dimension;
use crate::error::invalid;
use crate::error::Error;
use crate::error::Result;
use crate::linalg::central_difference;
use crate::linalg::correlation_cholesky;
use crate::linalg::forward_substitution;
use crate::linalg::select;
use crate::quadrature::unit_rule;
use crate::standard::normal_cdf;
use crate::standard::normal_log_pdf;
use crate::standard::normal_pdf;
use crate::standard::normal_quantile;
use crate::traits::EllipticalFamily;

const PREFIX_CLAMP: f64 = 1e-15;

#[derive(Debug, Clone)]
enum Kernel {
  Normal,
  /// `laws[i]` is the standard Student law with `nu + i` degrees of freedom.
  Student {
    nu: f64,
    laws: Vec<statrs::distribution::StudentsT>,
  },
}

impl Kernel {
  fn cdf(&self, i: usize, t: f64) -> f64 {
    match self {
      Kernel::Normal => normal_cdf(t),
      Kernel::Student { laws, .. } => {
        if t.is_infinite() {
          return if t > 0.0 { 1.0 } else { 0.0 };
        }
        laws[i].cdf(t)
      }
    }
  }

  fn pdf(&self, i: usize, t: f64) -> f64 {
    match self {
      Kernel::Normal => normal_pdf(t),
      Kernel::Student { laws, .. } => laws[i].pdf(t),
    }
  }

  fn log_pdf(&self, i: usize, t: f64) -> f64 {
    match self {
      Kernel::Normal => normal_log_pdf(t),
      Kernel::Student { laws, .. } => laws[i].ln_pdf(t),
    }
  }

  fn quantile(&self, i: usize, p: f64) -> f64 {
    if p <= 0.0 {
      return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
      return f64::INFINITY;
    }
    match self {
      Kernel::Normal => normal_quantile(p),
      Kernel::Student { laws, .. } => laws[i].inverse_cdf(p),
    }
  }
}

#[derive(Debug, Clone)]
pub struct EllipticalCopula {
  family: EllipticalFamily,
  kernel: Kernel,
  correlation: Array2<f64>,
  cholesky: Array2<f64>,
  log_det: f64,
}

impl EllipticalCopula {
  pub fn new(family: EllipticalFamily, correlation: Array2<f64>) -> Result<Self> {
    let cholesky = correlation_cholesky(&correlation)?;
    let d = correlation.nrows();
    let log_det = 2.0 * (0..d).map(|i| cholesky[[i, i]].ln()).sum::<f64>();
    let kernel = match family {
      EllipticalFamily::Normal => Kernel::Normal,
      EllipticalFamily::Student { nu } => {
        if !(nu > 0.0) || !nu.is_finite() {
          return invalid(format!("Student copula requires nu > 0, got {nu}"));
        }
        let laws = (0..d)
          .map(|i| {
            statrs::distribution::StudentsT::new(0.0, 1.0, nu + i as f64)
              .map_err(|e| Error::InvalidArgument(e.to_string()))
          })
          .collect::<Result<Vec<_>>>()?;
        Kernel::Student { nu, laws }
      }
    };

    Ok(Self {
      family,
      kernel,
      correlation,
      cholesky,
      log_det,
    })
  }

  pub fn normal(correlation: Array2<f64>) -> Result<Self> {
    Self::new(EllipticalFamily::Normal, correlation)
  }

  pub fn student(nu: f64, correlation: Array2<f64>) -> Result<Self> {
    Self::new(EllipticalFamily::Student { nu }, correlation)
  }

  pub fn dimension(&self) -> usize {
    self.correlation.nrows()
  }

  pub fn family(&self) -> EllipticalFamily {
    self.family
  }

  /// Shape matrix R.
  pub fn correlation(&self) -> &Array2<f64> {
    &self.correlation
  }

  /// Lower Cholesky factor of R.
  pub fn cholesky(&self) -> &Array2<f64> {
    &self.cholesky
  }

  /// CDF of the standard one-dimensional marginal of the kernel.
  pub fn standard_cdf(&self, z: f64) -> f64 {
    self.kernel.cdf(0, z)
  }

  pub fn standard_pdf(&self, z: f64) -> f64 {
    self.kernel.pdf(0, z)
  }

  pub fn standard_quantile(&self, p: f64) -> f64 {
    self.kernel.quantile(0, p)
  }

  /// Location and scale of component `z_prefix.len()` given the standard-space prefix.
  fn conditional_law(&self, z_prefix: ArrayView1<f64>) -> (f64, f64) {
    let i = z_prefix.len();
    let w = forward_substitution(&self.cholesky, z_prefix);
    let location = (0..i).map(|j| self.cholesky[[i, j]] * w[j]).sum::<f64>();
    let scale = match &self.kernel {
      Kernel::Normal => self.cholesky[[i, i]],
      Kernel::Student { nu, .. } => {
        let q = w.dot(&w);
        self.cholesky[[i, i]] * ((nu + q) / (nu + i as f64)).sqrt()
      }
    };
    (location, scale)
  }

  fn standardize_prefix(&self, y: &Array1<f64>) -> Array1<f64> {
    y.mapv(|v| self.standard_quantile(v.clamp(PREFIX_CLAMP, 1.0 - PREFIX_CLAMP)))
  }

  pub fn log_pdf(&self, u: &Array1<f64>) -> f64 {
    if u.iter().any(|&v| v <= 0.0 || v >= 1.0) {
      return f64::NEG_INFINITY;
    }
    let d = self.dimension() as f64;
    let z = u.mapv(|v| self.standard_quantile(v));
    let w = forward_substitution(&self.cholesky, z.view());
    let quad = w.dot(&w);
    match &self.kernel {
      Kernel::Normal => -0.5 * (quad - z.dot(&z)) - 0.5 * self.log_det,
      Kernel::Student { nu, .. } => {
        let log_norm =
          ln_gamma(0.5 * (nu + d)) - ln_gamma(0.5 * nu) - 0.5 * d * (nu * PI).ln();
        let joint = log_norm - 0.5 * self.log_det - 0.5 * (nu + d) * (quad / nu).ln_1p();
        joint - z.iter().map(|&zi| self.kernel.log_pdf(0, zi)).sum::<f64>()
      }
    }
  }

  pub fn pdf(&self, u: &Array1<f64>) -> f64 {
    self.log_pdf(u).exp()
  }

  /// Product of the truncated conditional probabilities along one
  /// separation-of-variables path; `v` drives the conditional draws.
  fn separated_probability(&self, z: &Array1<f64>, v: &[f64]) -> f64 {
    let d = self.dimension();
    let mut w = Array1::<f64>::zeros(d);
    let mut probability = 1.0;
    let mut q = 0.0;
    for i in 0..d {
      let location = (0..i).map(|j| self.cholesky[[i, j]] * w[j]).sum::<f64>();
      let spread = match &self.kernel {
        Kernel::Normal => 1.0,
        Kernel::Student { nu, .. } => ((nu + q) / (nu + i as f64)).sqrt(),
      };
      let scale = self.cholesky[[i, i]] * spread;
      let e = self.kernel.cdf(i, (z[i] - location) / scale);
      probability *= e;
      if probability <= 0.0 {
        return 0.0;
      }
      if i + 1 < d {
        let t = self.kernel.quantile(i, v[i] * e);
        w[i] = t * spread;
        q += w[i] * w[i];
      }
    }
    probability
  }

  /// Bivariate CDF at standardized `(h, k)`, symmetric in its arguments.
  fn bivariate_cdf(&self, h: f64, k: f64) -> Result<f64> {
    let rho = self.correlation[[1, 0]];
    let rule = unit_rule(ELLIPTICAL_CDF_NODES)?;
    match &self.kernel {
      Kernel::Normal => {
        // Phi(h) Phi(k) + 1/(2 pi) int_0^{asin rho} exp(-(h^2 + k^2 - 2hk sin t) / (2 cos^2 t)) dt
        let squares = h * h + k * k;
        let cross = 2.0 * (h * k);
        let angle = rule.integrate(0.0, rho.asin(), |t| {
          let (sin, cos) = t.sin_cos();
          (-(squares - cross * sin) / (2.0 * cos * cos)).exp()
        });
        Ok((normal_cdf(h) * normal_cdf(k) + angle / (2.0 * PI)).clamp(0.0, 1.0))
      }
      Kernel::Student { nu, .. } => {
        let spread = (1.0 - rho * rho).sqrt();
        // x = a - s / (1 - s) maps (0, 1) onto (-inf, a]; the tail leaves a
        // smooth (1 - s)^(nu - 1) factor at s = 1.
        let one_sided = |a: f64, b: f64| {
          let integrand = |s: f64| {
            if s >= 1.0 {
              return 0.0;
            }
            let x = a - s / (1.0 - s);
            let scale = spread * ((nu + x * x) / (nu + 1.0)).sqrt();
            self.kernel.pdf(0, x) * self.kernel.cdf(1, (b - rho * x) / scale)
              / ((1.0 - s) * (1.0 - s))
          };
          rule.integrate(0.0, 0.5, integrand) + rule.integrate(0.5, 1.0, integrand)
        };
        Ok((0.5 * (one_sided(h, k) + one_sided(k, h))).clamp(0.0, 1.0))
      }
    }
  }

  pub fn cdf(&self, u: &Array1<f64>) -> Result<f64> {
    let d = self.dimension();
    check_dimension(d, u.len(), "point")?;
    let u = u.mapv(|v| v.clamp(0.0, 1.0));
    if u.iter().any(|&v| v <= 0.0) {
      return Ok(0.0);
    }
    let open: Vec<usize> = (0..d).filter(|&i| u[i] < 1.0).collect();
    match open.len() {
      0 => return Ok(1.0),
      1 => return Ok(u[open[0]]),
      _ => {}
    }
    if open.len() < d {
      let sub = self.sub_copula(&open)?;
      return sub.cdf(&open.iter().map(|&i| u[i]).collect());
    }

    let z = u.mapv(|v| self.standard_quantile(v));
    if d == 2 {
      return self.bivariate_cdf(z[0], z[1]);
    }

    // Richtmyer rank-1 lattice over the d - 1 conditional draws.
    let alphas: Vec<f64> = richtmyer_generators(d - 1);
    let n = ELLIPTICAL_CDF_LATTICE_POINTS;
    let mut v = vec![0.0; d - 1];
    let mut acc = 0.0;
    for k in 1..=n {
      for (j, alpha) in alphas.iter().enumerate() {
        let frac = (k as f64 * alpha).fract();
        // Baker's transform makes the integrand periodic.
        v[j] = 1.0 - (2.0 * frac - 1.0).abs();
      }
      acc += self.separated_probability(&z, &v);
    }
    Ok(acc / n as f64)
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

  pub fn conditional_pdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    if x <= 0.0 || x >= 1.0 {
      return Ok(0.0);
    }
    if y.is_empty() {
      return Ok(1.0);
    }
    let zy = self.standardize_prefix(y);
    let (location, scale) = self.conditional_law(zy.view());
    let z = self.standard_quantile(x);
    let i = y.len();
    Ok(self.kernel.pdf(i, (z - location) / scale) / scale / self.standard_pdf(z))
  }

  pub fn conditional_cdf(&self, x: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    if x <= 0.0 {
      return Ok(0.0);
    }
    if x >= 1.0 {
      return Ok(1.0);
    }
    if y.is_empty() {
      return Ok(x);
    }
    let zy = self.standardize_prefix(y);
    let (location, scale) = self.conditional_law(zy.view());
    let z = self.standard_quantile(x);
    Ok(self.kernel.cdf(y.len(), (z - location) / scale))
  }

  pub fn conditional_quantile(&self, q: f64, y: &Array1<f64>) -> Result<f64> {
    self.check_prefix(y)?;
    crate::error::check_probability(q)?;
    if y.is_empty() {
      return Ok(q);
    }
    let zy = self.standardize_prefix(y);
    let (location, scale) = self.conditional_law(zy.view());
    let t = self.kernel.quantile(y.len(), q);
    Ok(self.standard_cdf(location + scale * t))
  }

  pub fn sample(&self, n: usize) -> Array2<f64> {
    let d = self.dimension();
    let mut rng = rand::thread_rng();
    let g = Array2::<f64>::from_shape_fn((n, d), |_| rng.sample(StandardNormal));
    let mut z = g.dot(&self.cholesky.t());
    if let Kernel::Student { nu, .. } = &self.kernel {
      // nu > 0 is checked at construction.
      if let Ok(chi) = ChiSquared::new(*nu) {
        for mut row in z.axis_iter_mut(Axis(0)) {
          let s: f64 = rng.sample(&chi);
          row.mapv_inplace(|v| v / (s / nu).sqrt());
        }
      }
    }
    z.mapv_inplace(|v| self.standard_cdf(v));
    z
  }

  fn sub_copula(&self, indices: &[usize]) -> Result<EllipticalCopula> {
    EllipticalCopula::new(self.family, select(&self.correlation, indices))
  }

  pub fn marginal(&self, indices: &[usize]) -> Result<Core> {
    if indices.len() == 1 {
      return Ok(Core::Independent(IndependentCopula::new(1)?));
    }
    Ok(Core::Elliptical(self.sub_copula(indices)?))
  }

  /// Decorrelation to the standard spherical space: `w = L^{-1} G^{-1}(u)`.
  pub fn transform(&self, u: &Array1<f64>) -> Array1<f64> {
    let z = u.mapv(|v| self.standard_quantile(v));
    forward_substitution(&self.cholesky, z.view())
  }

  pub fn inverse_transform(&self, w: &Array1<f64>) -> Array1<f64> {
    self.cholesky.dot(w).mapv(|v| self.standard_cdf(v))
  }

  /// Kendall's tau of any elliptical copula: `2/pi * asin(R)`.
  pub fn kendall_tau(&self) -> Array2<f64> {
    self.correlation.mapv(|r| 2.0 / PI * r.asin())
  }

  /// Strict lower triangle of R, row by row, then `nu` for Student.
  pub fn parameters(&self) -> Vec<f64> {
    let d = self.dimension();
    let mut out = Vec::with_capacity(d * (d - 1) / 2 + 1);
    for i in 1..d {
      out.extend(self.correlation.slice(s![i, ..i]).iter());
    }
    if let EllipticalFamily::Student { nu } = self.family {
      out.push(nu);
    }
    out
  }

  pub fn parameter_names(&self) -> Vec<String> {
    let d = self.dimension();
    let mut out = Vec::new();
    for i in 1..d {
      for j in 0..i {
        out.push(format!("R_{i}_{j}"));
      }
    }
    if matches!(self.family, EllipticalFamily::Student { .. }) {
      out.push("nu".into());
    }
    out
  }

  pub fn with_parameters(&self, parameters: &[f64]) -> Result<Self> {
    check_dimension(self.parameters().len(), parameters.len(), "parameter vector")?;
    let d = self.dimension();
    let mut correlation = Array2::<f64>::eye(d);
    let mut k = 0;
    for i in 1..d {
      for j in 0..i {
        correlation[[i, j]] = parameters[k];
        correlation[[j, i]] = parameters[k];
        k += 1;
      }
    }
    let family = match self.family {
      EllipticalFamily::Normal => EllipticalFamily::Normal,
      EllipticalFamily::Student { .. } => EllipticalFamily::Student { nu: parameters[k] },
    };
    Self::new(family, correlation)
  }

  pub fn pdf_gradient(&self, u: &Array1<f64>, step: f64) -> Result<Array1<f64>> {
    central_difference(&self.parameters(), step, |p| Ok(self.with_parameters(p)?.pdf(u)))
  }

  pub fn cdf_gradient(&self, u: &Array1<f64>, step: f64) -> Result<Array1<f64>> {
    central_difference(&self.parameters(), step, |p| self.with_parameters(p)?.cdf(u))
  }
}

fn richtmyer_generators(n: usize) -> Vec<f64> {
  let mut primes = Vec::with_capacity(n);
  let mut candidate = 2u64;
  while primes.len() < n {
    if (2..candidate).take_while(|p| p * p <= candidate).all(|p| candidate % p != 0) {
      primes.push(candidate);
    }
    candidate += 1;
  }
  primes.iter().map(|&p| (p as f64).sqrt().fract()).collect()
}
