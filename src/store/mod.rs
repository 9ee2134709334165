//! Loyalty Store Abstraction Layer
//!
//! The query and mutation engines talk to a [`LoyaltyStore`]. The MongoDB
//! backend pushes the work to the server as aggregation pipelines and array
//! updates; the memory backend evaluates the same semantics in process.

pub mod amount;
pub mod memory;
pub mod mongo;
pub mod types;

pub use memory::MemoryLoyaltyStore;
pub use mongo::{MongoConnection, MongoLoyaltyStore};
pub use types::{
    HappyHourRecord, HighSpender, LoyaltyDocument, Member, MemberName, MutationOutcome, SpendRow,
};

use crate::error::Result;
use async_trait::async_trait;

/// Read and write operations over the loyalty collection
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Backend name used in logs
    fn backend_name(&self) -> &'static str;

    /// Mean `Age` over every member, `0.0` when there are none
    async fn average_age(&self) -> Result<f64>;

    /// Members with `Level_of_membership >= min_level` and `Age > older_than`
    async fn members_by_level_and_age(&self, min_level: i32, older_than: i32)
        -> Result<Vec<Member>>;

    /// Happy-hour records joined with `member` on `Member_ID`, amounts not yet coerced
    async fn spend_rows(&self) -> Result<Vec<SpendRow>>;

    /// Every happy-hour record, amounts not yet coerced
    async fn happy_hour_amounts(&self) -> Result<Vec<SpendRow>>;

    /// Names of members with `Time_of_purchase > minutes`, ascending
    async fn long_purchases(&self, minutes: i32) -> Result<Vec<MemberName>>;

    /// Members holding exactly `card`
    async fn members_with_card(&self, card: &str) -> Result<Vec<Member>>;

    /// Append `member` to the `member` array of the first parent document
    async fn push_member(&self, member: &Member) -> Result<MutationOutcome>;

    /// Set `Time_of_purchase` on the array elements named `name` only
    async fn set_purchase_time(&self, name: &str, minutes: i32) -> Result<MutationOutcome>;

    /// Remove every `member` element with `Time_of_purchase == minutes`
    async fn pull_by_purchase_time(&self, minutes: i32) -> Result<MutationOutcome>;

    /// The `member` array of the first document, empty when there is none
    async fn first_document_members(&self) -> Result<Vec<Member>>;
}
