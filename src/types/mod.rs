//! Shared types for garage

pub mod error;

pub use error::{codes, DuplicateField, ErrorResponse, GarageError, Result};
