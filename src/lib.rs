//! Computerized adaptive testing engine.
//!
//! This crate provides the building blocks of an adaptive testing
//! simulation, including:
//! - Typed latent trait spaces (continuous, binary, natural dimensions)
//! - Item response models: 1PL/2PL/3PL logistic, graded response,
//!   generalized partial credit, nominal response, DINA and NIDA
//!   cognitive diagnosis
//! - Analytic gradients, Hessians, and Fisher information for ability
//!   estimation and item calibration
//! - Item selection: random, closest difficulty, maximum Fisher
//!   information (D- and A-optimality), Kullback-Leibler index,
//!   alpha-stratification with b-blocking
//! - Newton-Raphson maximum-likelihood ability estimation with
//!   exhaustive search over discrete dimensions
//! - Stopping rules (fixed length, standard-error threshold), exposure
//!   counters, and classification-rate tabulation
//! - Parallel batch simulation with per-examinee deterministic RNG
//!   streams

pub mod utils;

pub mod administrand;
pub mod algorithm;
pub mod algorithms;
pub mod batch;
pub mod bitmask;
pub mod covariates;
pub mod error;
pub mod examinee;
pub mod intern;
pub mod itembank;
pub mod model;
pub mod models;
pub mod space;
pub mod test;

pub use administrand::{Administrand, Characteristics, Item};
pub use covariates::Covariates;
pub use error::{CatError, Result};
pub use examinee::Examinee;
pub use itembank::ItemBank;
pub use model::ResponseModel;
pub use space::{Dim, DimType, LatentSpace, Point};
pub use test::Test;
