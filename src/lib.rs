//! Fit axis-aligned boxes to a solid by **gradient descent over a voxelized
//! signed distance field**.
//!
//! The solid is sampled into a [`SignedDistanceField`](field::SignedDistanceField)
//! whose vertices are classified against the surface (border, interior,
//! exterior). Freezing the field derives a C¹ tricubic interpolant of the
//! weights, and the [`EnergyModel`](energy::EnergyModel) integrates it in
//! closed form over any box. The [`Optimizer`](optimizer::Optimizer) moves box
//! faces along the analytic energy gradient, one box at a time or a whole
//! [`BoxCollection`](collection::BoxCollection) at once.
//!
//! ```rust
//! use boxfit::field::SignedDistanceField;
//! use boxfit::fitbox::FitBox;
//! use boxfit::float_types::{Real, parry3d::bounding_volume::Aabb};
//! use boxfit::optimizer::Optimizer;
//! use nalgebra::Point3;
//!
//! # fn main() -> Result<(), boxfit::errors::Error> {
//! let sphere = |p: &Point3<Real>| p.coords.norm() - 1.0;
//! let bounds = Aabb::new(Point3::new(-1.5, -1.5, -1.5), Point3::new(1.5, 1.5, 1.5));
//! let mut field = SignedDistanceField::build([13, 13, 13], bounds, &sphere)?;
//! field.classify_and_freeze(&sphere, 0.5, 0.125)?;
//!
//! let mut fit = FitBox::full_domain(&field);
//! let result = Optimizer::default().gradient_descent(&field, &mut fit, None)?;
//! assert!(result.energy <= result.initial_energy);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//! #### Default
//! - **parallel**: use rayon for sampling, classification, coefficient
//!   derivation and batch optimization
//! - [**stl-io**](https://en.wikipedia.org/wiki/STL_(file_format)): `.stl` export of box meshes
//! - **mesh-query**: signed distance queries against a parry `TriMesh`

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod collection;
pub mod energy;
pub mod errors;
pub mod field;
pub mod fitbox;
pub mod float_types;
pub mod io;
pub mod optimizer;
pub mod session;
pub mod surface;
pub mod triangulated;

pub use collection::BoxCollection;
pub use energy::{EnergyConfig, EnergyModel};
pub use errors::Error;
pub use field::SignedDistanceField;
pub use fitbox::FitBox;
pub use io::Persist;
pub use optimizer::{Optimizer, OptimizerConfig};
pub use session::FittingSession;
