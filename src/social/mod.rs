//! Social graph: friends, following and followers
//!
//! - `query`: direction-aware relation filters
//! - `store`: relation storage trait and MongoDB implementation
//! - `graph`: list and mutate relations for a user

pub mod graph;
pub mod query;
pub mod store;

pub use graph::{RelationView, SocialGraph, UserRef};
pub use query::{Endpoint, RelationQuery};
pub use store::{MongoSocialStore, SocialStore};
