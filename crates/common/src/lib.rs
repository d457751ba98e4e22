//! Shared configuration, error and data-model types for the compliance
//! analysis gateway.

pub mod config;
pub mod error;
pub mod model;

pub use config::*;
pub use error::{SgnError, SgnResult};
pub use model::*;
