use std::hint::black_box;
use std::sync::Arc;

use copula_rs::config::Settings;
use copula_rs::marginals::Exponential;
use copula_rs::marginals::Normal;
use copula_rs::marginals::StudentT;
use copula_rs::Core;
use copula_rs::JointDistribution;
use copula_rs::UnivariateExt;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use ndarray::array;
use ndarray::Array1;
use ndarray::Array2;

fn correlation(d: usize, rho: f64) -> Array2<f64> {
  Array2::from_shape_fn((d, d), |(i, j)| if i == j { 1.0 } else { rho })
}

fn student_joint(d: usize) -> JointDistribution {
  let components: Vec<Arc<dyn UnivariateExt>> = (0..d)
    .map(|_| Arc::new(Exponential::new(1.0).unwrap()) as Arc<dyn UnivariateExt>)
    .collect();
  JointDistribution::new(components, Core::student(4.0, correlation(d, 0.3)).unwrap()).unwrap()
}

fn bench_sampling(c: &mut Criterion) {
  let mut group = c.benchmark_group("Sampling");
  let joint = student_joint(4);

  for &n in &[1_000, 10_000, 100_000] {
    group.bench_with_input(BenchmarkId::new("parallel", n), &n, |b, &n| {
      b.iter(|| black_box(joint.sample(n).unwrap()))
    });

    let serial = joint.clone().with_settings(Settings {
      parallel_sampling_threshold: usize::MAX,
      ..Settings::default()
    });
    group.bench_with_input(BenchmarkId::new("serial", n), &n, |b, &n| {
      b.iter(|| black_box(serial.sample(n).unwrap()))
    });
  }

  group.finish();
}

fn bench_cdf(c: &mut Criterion) {
  let mut group = c.benchmark_group("CDF");

  for &d in &[2usize, 3, 5] {
    let joint = student_joint(d);
    let x = Array1::from_elem(d, 0.8);
    group.bench_with_input(BenchmarkId::new("student", d), &x, |b, x| {
      b.iter(|| black_box(joint.cdf(x).unwrap()))
    });
  }

  group.finish();
}

fn bench_transform(c: &mut Criterion) {
  let mut group = c.benchmark_group("Transform");

  let elliptical = JointDistribution::new(
    vec![
      Arc::new(Normal::new(0.0, 1.0).unwrap()),
      Arc::new(Normal::new(1.0, 2.0).unwrap()),
    ],
    Core::normal(array![[1.0, 0.5], [0.5, 1.0]]).unwrap(),
  )
  .unwrap();
  let rosenblatt = JointDistribution::new(
    vec![
      Arc::new(StudentT::new(5.0, 0.0, 1.0).unwrap()),
      Arc::new(Exponential::new(2.0).unwrap()),
    ],
    Core::ordinal_sum(
      vec![
        Core::student(3.0, correlation(2, 0.5)).unwrap(),
        Core::independent(2).unwrap(),
      ],
      &[0.6],
    )
    .unwrap(),
  )
  .unwrap();

  for (name, joint) in [("elliptical", elliptical), ("rosenblatt", rosenblatt)] {
    let t = joint.iso_probabilistic_transformation().unwrap();
    let points = joint.sample(1_000).unwrap();
    group.bench_function(name, |b| {
      b.iter(|| black_box(t.evaluate_batch(&points).unwrap()))
    });
  }

  group.finish();
}

fn bench_covariance(c: &mut Criterion) {
  c.bench_function("Covariance/quadrature", |b| {
    b.iter(|| {
      // Fresh joint so the memoised value is not reused.
      let joint = student_joint(3);
      black_box(joint.covariance().unwrap())
    })
  });
}

criterion_group!(
  benches,
  bench_sampling,
  bench_cdf,
  bench_transform,
  bench_covariance
);
criterion_main!(benches);
