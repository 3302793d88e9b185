use std::sync::Arc;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use copula_rs::marginals::Exponential;
use copula_rs::marginals::Normal;
use copula_rs::marginals::StudentT;
use copula_rs::marginals::Uniform;
use copula_rs::Core;
use copula_rs::JointDistribution;
use copula_rs::TransformStrategy;
use copula_rs::UnivariateExt;
use ndarray::array;
use ndarray::Array1;
use ndarray::Array2;

fn uniforms(d: usize) -> Result<Vec<Arc<dyn UnivariateExt>>> {
  (0..d)
    .map(|_| Ok(Arc::new(Uniform::new(0.0, 1.0)?) as Arc<dyn UnivariateExt>))
    .collect()
}

fn fixtures() -> Result<Vec<JointDistribution>> {
  Ok(vec![
    JointDistribution::independent(vec![
      Arc::new(Exponential::new(1.3)?),
      Arc::new(Normal::new(2.0, 0.5)?),
    ])?,
    JointDistribution::new(
      vec![
        Arc::new(Normal::new(1.0, 2.0)?),
        Arc::new(Normal::new(-1.0, 0.5)?),
        Arc::new(Normal::new(0.0, 1.0)?),
      ],
      Core::normal(array![[1.0, 0.3, 0.2], [0.3, 1.0, 0.4], [0.2, 0.4, 1.0]])?,
    )?,
    JointDistribution::new(
      vec![
        Arc::new(Uniform::new(-2.0, 2.0)?),
        Arc::new(Exponential::new(0.5)?),
      ],
      Core::student(5.0, array![[1.0, -0.6], [-0.6, 1.0]])?,
    )?,
    JointDistribution::new(
      vec![
        Arc::new(StudentT::new(4.0, 0.0, 1.0)?),
        Arc::new(Exponential::new(2.0)?),
      ],
      Core::ordinal_sum(
        vec![
          Core::student(4.0, array![[1.0, 0.5], [0.5, 1.0]])?,
          Core::normal(array![[1.0, 0.2], [0.2, 1.0]])?,
        ],
        &[0.5],
      )?,
    )?,
  ])
}

#[test]
fn joint_cdf_is_the_core_cdf_of_the_component_cdfs() -> Result<()> {
  let points = [array![0.2, 0.3], array![-1.0, 1.2], array![1.5, 0.05]];
  for joint in fixtures()? {
    if joint.dimension() != 2 {
      continue;
    }
    for x in &points {
      let u = Array1::from_shape_fn(2, |i| joint.components()[i].cdf(x[i]));
      assert_abs_diff_eq!(joint.cdf(x)?, joint.core().cdf(&u)?, epsilon = 1e-12);
    }
  }
  Ok(())
}

#[test]
fn each_strategy_round_trips_in_both_directions() -> Result<()> {
  let expected = [
    TransformStrategy::Independent,
    TransformStrategy::Elliptical,
    TransformStrategy::EllipticalCopula,
    TransformStrategy::General { rosenblatt: true },
  ];
  for (joint, strategy) in fixtures()?.into_iter().zip(expected) {
    let forward = joint.iso_probabilistic_transformation()?;
    let inverse = joint.inverse_iso_probabilistic_transformation()?;
    assert_eq!(forward.strategy(), strategy);
    assert_eq!(inverse.strategy(), strategy);

    // Rows drawn from the joint keep the ordinal sum on its diagonal blocks.
    let xs = joint.sample(20)?;
    for x in xs.rows() {
      let x = x.to_owned();
      let back = inverse.evaluate(&forward.evaluate(&x)?)?;
      for (a, b) in back.iter().zip(x.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6 * b.abs().max(1.0));
      }
    }

    let z = array_of(joint.dimension(), &[0.3, -0.7, 1.1]);
    let again = forward.evaluate(&inverse.evaluate(&z)?)?;
    for (a, b) in again.iter().zip(z.iter()) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-5);
    }
  }
  Ok(())
}

fn array_of(d: usize, values: &[f64]) -> Array1<f64> {
  Array1::from_shape_fn(d, |i| values[i % values.len()])
}

#[test]
fn independent_cores_are_flat() -> Result<()> {
  let cores = [
    Core::independent(3)?,
    Core::normal(Array2::eye(3))?,
    Core::ordinal_sum(vec![Core::independent(3)?], &[])?,
  ];
  for core in cores {
    assert!(core.has_independent_copula());
    assert_abs_diff_eq!(core.pdf(&array![0.1, 0.5, 0.93])?, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
      core.conditional_cdf(0.42, &array![0.9, 0.01])?,
      0.42,
      epsilon = 1e-12
    );
  }
  Ok(())
}

#[test]
fn covariance_is_memoised_and_matches_monte_carlo() -> Result<()> {
  let joint = JointDistribution::new(
    vec![Arc::new(Exponential::new(1.0)?), Arc::new(Uniform::new(0.0, 3.0)?)],
    Core::student(8.0, array![[1.0, 0.7], [0.7, 1.0]])?,
  )?;
  assert!(!joint.is_independent());
  assert!(!joint.is_elliptical());

  let first = joint.covariance()?;
  let second = joint.covariance()?;
  assert_eq!(first.as_slice(), second.as_slice());

  let s = joint.sample(50_000)?;
  let x = &s.column(0) - s.column(0).mean().unwrap_or(0.0);
  let y = &s.column(1) - s.column(1).mean().unwrap_or(0.0);
  let empirical = x.dot(&y) / (s.nrows() as f64 - 1.0);
  assert_abs_diff_eq!(first[[0, 1]], empirical, epsilon = 0.04);
  assert_abs_diff_eq!(first[[1, 1]], 0.75, epsilon = 1e-12);
  Ok(())
}

#[test]
fn block_marginals_keep_the_narrowest_structure() -> Result<()> {
  let core = Core::block_composed(vec![
    Core::normal(array![[1.0, 0.5], [0.5, 1.0]])?,
    Core::independent(1)?,
    Core::student(3.0, array![[1.0, 0.1], [0.1, 1.0]])?,
  ])?;
  assert!(matches!(core.marginal(&[0, 1])?, Core::Elliptical(_)));
  assert!(matches!(core.marginal(&[3, 4])?, Core::Elliptical(_)));
  assert!(matches!(core.marginal(&[1, 3])?, Core::Marginal(_)));
  assert!(matches!(core.marginal(&[0, 4])?, Core::Marginal(_)));
  Ok(())
}

#[test]
fn ordinal_sum_with_an_interior_bound() -> Result<()> {
  let core = Core::ordinal_sum(
    vec![Core::independent(2)?, Core::independent(2)?],
    &[0.4],
  )?;
  // Off the diagonal blocks the copula is the minimum copula.
  assert_abs_diff_eq!(core.cdf(&array![0.3, 0.5])?, 0.3, epsilon = 1e-15);
  assert_eq!(core.pdf(&array![0.3, 0.5])?, 0.0);
  // (0.5, 0.5) sits on the second diagonal block [0.4, 1]^2.
  let inner = (0.5 - 0.4) / 0.6;
  assert_abs_diff_eq!(
    core.cdf(&array![0.5, 0.5])?,
    0.4 + 0.6 * inner * inner,
    epsilon = 1e-12
  );
  Ok(())
}

#[test]
fn independent_uniform_scenario() -> Result<()> {
  let joint = JointDistribution::new(uniforms(2)?, Core::independent(2)?)?;
  assert_abs_diff_eq!(joint.cdf(&array![0.3, 0.4])?, 0.12, epsilon = 1e-12);
  Ok(())
}

#[test]
fn standard_normal_pair_is_elliptical_and_linear() -> Result<()> {
  let joint = JointDistribution::new(
    vec![Arc::new(Normal::new(0.0, 1.0)?), Arc::new(Normal::new(0.0, 1.0)?)],
    Core::normal(array![[1.0, 0.5], [0.5, 1.0]])?,
  )?;
  assert!(joint.is_elliptical());
  let t = joint.iso_probabilistic_transformation()?;
  assert_eq!(t.strategy(), TransformStrategy::Elliptical);

  let l21 = 0.5;
  let l22 = 0.75f64.sqrt();
  for x in [array![1.0, -2.0], array![0.3, 0.7], array![-4.0, 5.0]] {
    let z = t.evaluate(&x)?;
    assert_abs_diff_eq!(z[0], x[0], epsilon = 1e-14);
    assert_abs_diff_eq!(z[1], (x[1] - l21 * x[0]) / l22, epsilon = 1e-14);
  }
  let g = t.gradient(&array![0.0, 0.0])?;
  assert_abs_diff_eq!(g[[1, 0]], -l21 / l22, epsilon = 1e-14);
  assert_abs_diff_eq!(g[[1, 1]], 1.0 / l22, epsilon = 1e-14);
  Ok(())
}

#[test]
fn single_block_ordinal_sum_matches_the_independent_core() -> Result<()> {
  let plain = JointDistribution::new(uniforms(3)?, Core::independent(3)?)?;
  let ordinal = JointDistribution::new(
    uniforms(3)?,
    Core::ordinal_sum(vec![Core::independent(3)?], &[])?,
  )?;
  for x in [array![0.2, 0.5, 0.9], array![0.7, 0.1, 0.33], array![1.0, 0.0, 0.5]] {
    assert_eq!(plain.cdf(&x)?, ordinal.cdf(&x)?);
    assert_eq!(plain.pdf(&x)?, ordinal.pdf(&x)?);
    let y = x.slice(ndarray::s![..2]).to_owned();
    assert_eq!(
      plain.conditional_cdf(x[2], &y)?,
      ordinal.conditional_cdf(x[2], &y)?
    );
  }
  assert_eq!(
    plain.iso_probabilistic_transformation()?.strategy(),
    ordinal.iso_probabilistic_transformation()?.strategy()
  );
  Ok(())
}
