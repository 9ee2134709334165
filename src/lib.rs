//! # loyalty-rs
//!
//! Queries and array mutations over a coffee-shop loyalty collection in
//! MongoDB.
//!
//! A collection holds parent documents with two embedded arrays, `member`
//! and `happy_hour_member`. The [`query::QueryEngine`] runs six read-only
//! queries over them and the [`mutation::MutationEngine`] drives one member
//! through insert, modify and delete. Both work against any
//! [`store::LoyaltyStore`]: the MongoDB backend or the in-memory one.

pub mod config;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod query;
pub mod report;
pub mod seed;
pub mod store;

pub use error::{LoyaltyError, Result};
pub use mutation::{LifecyclePlan, MutationEngine};
pub use query::{QueryEngine, QueryThresholds};
pub use store::{LoyaltyStore, MemoryLoyaltyStore, MongoConnection, MongoLoyaltyStore};
