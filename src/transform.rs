//! # Transform
//!
//! $$
//! T:\ x\mapsto z,\qquad z=\begin{cases}
//! \big(\Phi^{-1}(F_i(x_i))\big)_i & \text{independent}\\
//! (\operatorname{diag}(\sigma)L)^{-1}(x-\mu) & \text{elliptical}\\
//! L^{-1}\big(G^{-1}(F_i(x_i))\big)_i & \text{elliptical copula}\\
//! \Phi^{-1}\big(R_C(F(x))\big) & \text{general}
//! \end{cases}
//! $$
//!
//! Isoprobabilistic transformations between the native space of a joint
//! distribution and its standard space. The strategy is fixed when the
//! transformation is built; the first matching case wins.
//!
use ndarray::parallel::prelude::*;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Array3;
use ndarray::Axis;
use tracing::debug;

use crate::copulas::elliptical::EllipticalCopula;
use crate::error::check_dimension;
use crate::error::Error;
use crate::error::Result;
use crate::joint::JointDistribution;
use crate::linalg::correlation_cholesky;
use crate::linalg::forward_substitution;
use crate::linalg::lower_triangular_inverse;
use crate::standard::normal_cdf;
use crate::standard::normal_quantile;

/// Case selected for a joint distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStrategy {
  /// Per-component maps to the standard normal.
  Independent,
  /// Affine decorrelation of a joint whose components share the copula's family.
  Elliptical,
  /// Components mapped to the copula's standard marginal, then decorrelated.
  EllipticalCopula,
  /// Components mapped to uniforms, then the structure's own transform or,
  /// when `rosenblatt` is set, the sequential conditional chain.
  General { rosenblatt: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  /// Native space to standard space.
  Forward,
  /// Standard space to native space.
  Inverse,
}

#[derive(Debug, Clone)]
enum Plan {
  Independent,
  Elliptical {
    location: Array1<f64>,
    scale: Array1<f64>,
    cholesky: Array2<f64>,
    inverse_cholesky: Array2<f64>,
  },
  EllipticalCopula {
    copula: EllipticalCopula,
    inverse_cholesky: Array2<f64>,
  },
  General {
    rosenblatt: bool,
  },
}

#[derive(Debug, Clone)]
pub struct IsoProbabilisticTransformation {
  joint: JointDistribution,
  plan: Plan,
  direction: Direction,
}

fn select_plan(joint: &JointDistribution) -> Result<Plan> {
  if joint.is_independent() {
    return Ok(Plan::Independent);
  }

  if joint.is_elliptical() {
    let d = joint.dimension();
    let mut location = Array1::<f64>::zeros(d);
    let mut scale = Array1::<f64>::zeros(d);
    for (i, c) in joint.components().iter().enumerate() {
      let (mu, sigma) = c.location_scale().ok_or_else(|| {
        Error::InvalidArgument(format!("component {i} has no location and scale"))
      })?;
      location[i] = mu;
      scale[i] = sigma;
    }
    let cholesky = correlation_cholesky(&joint.core().shape_matrix()?)?;
    let inverse_cholesky = lower_triangular_inverse(&cholesky)?;
    return Ok(Plan::Elliptical {
      location,
      scale,
      cholesky,
      inverse_cholesky,
    });
  }

  if let Some((family, shape)) = joint.core().elliptical_shape() {
    let copula = EllipticalCopula::new(family, shape)?;
    let inverse_cholesky = lower_triangular_inverse(copula.cholesky())?;
    return Ok(Plan::EllipticalCopula {
      copula,
      inverse_cholesky,
    });
  }

  Ok(Plan::General {
    rosenblatt: !joint.core().has_own_transform(),
  })
}

impl IsoProbabilisticTransformation {
  pub fn new(joint: &JointDistribution, direction: Direction) -> Result<Self> {
    let plan = select_plan(joint)?;
    let transformation = Self {
      joint: joint.clone(),
      plan,
      direction,
    };
    debug!(
      strategy = ?transformation.strategy(),
      ?direction,
      "built isoprobabilistic transformation"
    );
    Ok(transformation)
  }

  pub fn strategy(&self) -> TransformStrategy {
    match &self.plan {
      Plan::Independent => TransformStrategy::Independent,
      Plan::Elliptical { .. } => TransformStrategy::Elliptical,
      Plan::EllipticalCopula { .. } => TransformStrategy::EllipticalCopula,
      Plan::General { rosenblatt } => TransformStrategy::General {
        rosenblatt: *rosenblatt,
      },
    }
  }

  pub fn direction(&self) -> Direction {
    self.direction
  }

  pub fn dimension(&self) -> usize {
    self.joint.dimension()
  }

  /// Transformation mapping back in the opposite direction.
  pub fn inverse(&self) -> Self {
    Self {
      joint: self.joint.clone(),
      plan: self.plan.clone(),
      direction: match self.direction {
        Direction::Forward => Direction::Inverse,
        Direction::Inverse => Direction::Forward,
      },
    }
  }

  /// Component parameters followed by the dependence structure's.
  pub fn parameters(&self) -> Vec<f64> {
    self.joint.parameters()
  }

  pub fn parameter_description(&self) -> Vec<String> {
    self.joint.parameter_description()
  }

  pub fn evaluate(&self, point: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(self.dimension(), point.len(), "point")?;
    match self.direction {
      Direction::Forward => self.to_standard(point),
      Direction::Inverse => self.from_standard(point),
    }
  }

  /// Row-wise evaluation on the rayon pool.
  pub fn evaluate_batch(&self, points: &Array2<f64>) -> Result<Array2<f64>> {
    check_dimension(self.dimension(), points.ncols(), "sample")?;
    let rows = points
      .axis_iter(Axis(0))
      .into_par_iter()
      .map(|row| self.evaluate(&row.to_owned()))
      .collect::<Result<Vec<_>>>()?;
    let mut out = Array2::<f64>::zeros(points.dim());
    for (mut target, row) in out.axis_iter_mut(Axis(0)).zip(rows) {
      target.assign(&row);
    }
    Ok(out)
  }

  fn to_standard(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
    let components = self.joint.components();
    match &self.plan {
      Plan::Independent => Ok(Array1::from_shape_fn(x.len(), |i| {
        components[i].to_standard(x[i])
      })),
      Plan::Elliptical {
        location,
        scale,
        cholesky,
        ..
      } => {
        let y = (x - location) / scale;
        Ok(forward_substitution(cholesky, y.view()))
      }
      Plan::EllipticalCopula { copula, .. } => Ok(copula.transform(&self.joint.to_unit(x))),
      Plan::General { rosenblatt } => {
        let u = self.joint.to_unit(x);
        if *rosenblatt {
          Ok(
            self
              .joint
              .core()
              .sequential_conditional_cdf(&u)?
              .mapv(normal_quantile),
          )
        } else {
          self.joint.core().own_transform(&u)
        }
      }
    }
  }

  fn from_standard(&self, z: &Array1<f64>) -> Result<Array1<f64>> {
    let components = self.joint.components();
    match &self.plan {
      Plan::Independent => Ok(Array1::from_shape_fn(z.len(), |i| {
        components[i].from_standard(z[i])
      })),
      Plan::Elliptical {
        location,
        scale,
        cholesky,
        ..
      } => Ok(cholesky.dot(z) * scale + location),
      Plan::EllipticalCopula { copula, .. } => {
        Ok(self.joint.from_unit(&copula.inverse_transform(z)))
      }
      Plan::General { rosenblatt } => {
        let u = if *rosenblatt {
          self
            .joint
            .core()
            .sequential_conditional_quantile(&z.mapv(normal_cdf))?
        } else {
          self.joint.core().own_inverse_transform(z)?
        };
        Ok(self.joint.from_unit(&u))
      }
    }
  }

  /// Jacobian `J[[i, j]] = d out_i / d in_j`.
  pub fn gradient(&self, point: &Array1<f64>) -> Result<Array2<f64>> {
    check_dimension(self.dimension(), point.len(), "point")?;
    let components = self.joint.components();
    let d = self.dimension();
    match (&self.plan, self.direction) {
      (Plan::Independent, Direction::Forward) => Ok(Array2::from_diag(&Array1::from_shape_fn(
        d,
        |i| components[i].to_standard_derivative(point[i]),
      ))),
      (Plan::Independent, Direction::Inverse) => Ok(Array2::from_diag(&Array1::from_shape_fn(
        d,
        |i| 1.0 / components[i].to_standard_derivative(components[i].from_standard(point[i])),
      ))),
      (
        Plan::Elliptical {
          scale,
          inverse_cholesky,
          ..
        },
        Direction::Forward,
      ) => Ok(inverse_cholesky / &scale.view().insert_axis(Axis(0))),
      (
        Plan::Elliptical {
          scale, cholesky, ..
        },
        Direction::Inverse,
      ) => Ok(cholesky * &scale.view().insert_axis(Axis(1))),
      (
        Plan::EllipticalCopula {
          copula,
          inverse_cholesky,
        },
        Direction::Forward,
      ) => {
        // dy_i/dx_i with y_i = G^{-1}(F_i(x_i))
        let dy = Array1::from_shape_fn(d, |i| {
          let y = copula.standard_quantile(components[i].cdf(point[i]));
          components[i].pdf(point[i]) / copula.standard_pdf(y)
        });
        Ok(inverse_cholesky * &dy.view().insert_axis(Axis(0)))
      }
      (Plan::EllipticalCopula { copula, .. }, Direction::Inverse) => {
        let y = copula.cholesky().dot(point);
        let dx = Array1::from_shape_fn(d, |i| {
          let x = components[i].quantile(copula.standard_cdf(y[i]));
          copula.standard_pdf(y[i]) / components[i].pdf(x)
        });
        Ok(copula.cholesky() * &dx.view().insert_axis(Axis(1)))
      }
      (Plan::General { .. }, _) => self.finite_difference_jacobian(point),
    }
  }

  fn finite_difference_jacobian(&self, point: &Array1<f64>) -> Result<Array2<f64>> {
    let d = self.dimension();
    let h = self.joint.settings().finite_difference_step;
    let mut jacobian = Array2::<f64>::zeros((d, d));
    let mut shifted = point.clone();
    for j in 0..d {
      let step = h * point[j].abs().max(1.0);
      shifted[j] = point[j] + step;
      let plus = self.evaluate(&shifted)?;
      shifted[j] = point[j] - step;
      let minus = self.evaluate(&shifted)?;
      shifted[j] = point[j];
      jacobian
        .slice_mut(s![.., j])
        .assign(&((plus - minus) / (2.0 * step)));
    }
    Ok(jacobian)
  }

  /// `H[[i, j, k]] = d^2 out_i / d in_j d in_k`; identically zero for the
  /// affine elliptical case.
  pub fn hessian(&self, point: &Array1<f64>) -> Result<Array3<f64>> {
    check_dimension(self.dimension(), point.len(), "point")?;
    let d = self.dimension();
    let mut hessian = Array3::<f64>::zeros((d, d, d));
    if matches!(self.plan, Plan::Elliptical { .. }) {
      return Ok(hessian);
    }
    let h = self.joint.settings().finite_difference_step;
    let mut shifted = point.clone();
    for k in 0..d {
      let step = h * point[k].abs().max(1.0);
      shifted[k] = point[k] + step;
      let plus = self.gradient(&shifted)?;
      shifted[k] = point[k] - step;
      let minus = self.gradient(&shifted)?;
      shifted[k] = point[k];
      hessian
        .slice_mut(s![.., .., k])
        .assign(&((plus - minus) / (2.0 * step)));
    }
    Ok(hessian)
  }
}

impl JointDistribution {
  /// Map from the native space to the standard space.
  pub fn iso_probabilistic_transformation(&self) -> Result<IsoProbabilisticTransformation> {
    IsoProbabilisticTransformation::new(self, Direction::Forward)
  }

  /// Map from the standard space back to the native space.
  pub fn inverse_iso_probabilistic_transformation(
    &self,
  ) -> Result<IsoProbabilisticTransformation> {
    IsoProbabilisticTransformation::new(self, Direction::Inverse)
  }
}
