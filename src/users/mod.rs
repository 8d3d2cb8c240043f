//! User accounts
//!
//! - `store`: user storage trait and MongoDB implementation
//! - `service`: registration, login, profiles, account settings and name lookup

pub mod service;
pub mod store;

pub use service::{
    LoginRequest, LoginResponse, NewUser, PasswordChange, ProfileSettings, UserProfile, UserService,
};
pub use store::{MongoUserStore, UserStore};
