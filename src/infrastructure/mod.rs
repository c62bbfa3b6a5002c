//! Infrastructure layer: table I/O and DI container
//!
//! This layer reads and writes CSV tables and wires up services.

pub mod di;
pub mod error;
pub mod tables;
pub mod traits;

pub use di::ServiceContainer;
pub use error::{InfraError, InfraResult};
pub use tables::TableStore;
