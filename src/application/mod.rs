//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic over injected reference data.

pub mod error;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use services::{validate_options, ReferenceData, SignatureService};
