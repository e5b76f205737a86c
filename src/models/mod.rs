//! Concrete item response model variants.

pub mod cdm;
pub mod gpc;
pub mod graded;
pub mod logistic;
pub mod nominal;

pub use cdm::{Dina, Nida};
pub use gpc::PartialCreditModel;
pub use graded::GradedModel;
pub use logistic::LogisticModel;
pub use nominal::NominalModel;
