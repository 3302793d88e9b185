//! # copula-rs
//!
//! $$
//! F_{X_1,\dots,X_d}(x)=C\left(F_1(x_1),\dots,F_d(x_d)\right)
//! $$
//!
//! Joint distributions composed from per-component marginals and a dependence
//! structure, together with the isoprobabilistic transformations that map
//! them to an independent standard space.
//!
#![allow(clippy::needless_range_loop)]

pub mod conditional;
pub mod config;
pub mod copulas;
pub mod error;
pub mod joint;
pub mod linalg;
pub mod marginals;
pub mod quadrature;
pub mod standard;
pub mod traits;
pub mod transform;

pub use copulas::Core;
pub use error::Error;
pub use error::Result;
pub use joint::JointDistribution;
pub use joint::MarginalDistribution;
pub use traits::MultivariateExt;
pub use traits::UnivariateExt;
pub use transform::Direction;
pub use transform::IsoProbabilisticTransformation;
pub use transform::TransformStrategy;
