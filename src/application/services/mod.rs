//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Reference data is injected immutable; services never load files.

mod reference;
mod signature;

pub use reference::ReferenceData;
pub use signature::{validate_options, SignatureService};
