//! Shared data model for the yavdr-frontend supervisor: configuration schema,
//! runtime state enums and the project-wide error taxonomy.

pub mod config;
pub mod display;
pub mod error;
pub mod state;

pub use config::*;
pub use error::{ConfigError, FrontendError};
pub use state::{FrontendSlots, FrontendState};
