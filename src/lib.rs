//! Garage - course sharing backend
//!
//! Users publish courses with a visibility level and a sharing code, keep
//! friend and follow relations, and search courses scoped to what they may see.
//!
//! ## Components
//!
//! - **Registry**: per-client visit deduplication with threshold/TTL sweeps
//! - **Credentials**: caller id → role, language and friends
//! - **Social**: friend and follow relations, oriented per viewer
//! - **Policy**: grant decision for a record given its owner and visibility
//! - **Content**: scoped course search and version-checked updates
//! - **Users**: registration, login and profiles

pub mod auth;
pub mod config;
pub mod content;
pub mod credentials;
pub mod db;
pub mod logging;
pub mod policy;
pub mod registry;
pub mod routes;
pub mod server;
pub mod social;
pub mod types;
pub mod users;

pub use config::Args;
pub use server::{run, AppState, Stores};
pub use types::{GarageError, Result};
