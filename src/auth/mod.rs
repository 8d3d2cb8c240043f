//! Authentication for garage
//!
//! Provides:
//! - JWT token generation and validation (caller identity)
//! - Role tiers
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use roles::Role;
