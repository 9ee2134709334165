//! Mutation Engine
//!
//! Drives one member through Inserted -> Modified -> Deleted. Each step is
//! committed on its own and followed by a read-back of the member list. A
//! failed step is logged and recorded; the following steps still run.

use crate::error::Result;
use crate::store::{LoyaltyStore, Member, MutationOutcome};
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Insert,
    Modify,
    Delete,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Insert => write!(f, "insert"),
            MutationAction::Modify => write!(f, "modify"),
            MutationAction::Delete => write!(f, "delete"),
        }
    }
}

/// Member to insert and the purchase time it is modified to, then deleted by
#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePlan {
    pub member: Member,
    pub modified_purchase_time: i32,
}

impl Default for LifecyclePlan {
    fn default() -> Self {
        Self {
            member: Member {
                member_id: 45,
                name: "Marín, Alberto".to_string(),
                membership_card: "Black".to_string(),
                age: 30,
                time_of_purchase: 40,
                level_of_membership: 1,
                address: "Santoña".to_string(),
            },
            modified_purchase_time: 99,
        }
    }
}

/// One committed step and the member list read back after it
#[derive(Debug)]
pub struct MutationStep {
    pub action: MutationAction,
    pub outcome: Result<MutationOutcome>,
    pub members_after: Result<Vec<Member>>,
}

pub struct MutationEngine<'a> {
    store: &'a dyn LoyaltyStore,
}

impl<'a> MutationEngine<'a> {
    pub fn new(store: &'a dyn LoyaltyStore) -> Self {
        Self { store }
    }

    pub async fn insert(&self, member: &Member) -> Result<MutationOutcome> {
        self.store.push_member(member).await
    }

    /// Update `Time_of_purchase` of the elements named `match_name` only.
    pub async fn modify(&self, match_name: &str, new_purchase_time: i32) -> Result<MutationOutcome> {
        self.store
            .set_purchase_time(match_name, new_purchase_time)
            .await
    }

    /// Remove every element whose `Time_of_purchase` equals `match_value`.
    pub async fn delete(&self, match_value: i32) -> Result<MutationOutcome> {
        self.store.pull_by_purchase_time(match_value).await
    }

    pub async fn display_all(&self) -> Result<Vec<Member>> {
        self.store.first_document_members().await
    }

    pub async fn run_lifecycle(&self, plan: &LifecyclePlan) -> Vec<MutationStep> {
        let mut steps = Vec::with_capacity(3);

        let outcome = self.insert(&plan.member).await;
        steps.push(self.record(MutationAction::Insert, outcome).await);

        let outcome = self
            .modify(&plan.member.name, plan.modified_purchase_time)
            .await;
        steps.push(self.record(MutationAction::Modify, outcome).await);

        let outcome = self.delete(plan.modified_purchase_time).await;
        steps.push(self.record(MutationAction::Delete, outcome).await);

        steps
    }

    async fn record(&self, action: MutationAction, outcome: Result<MutationOutcome>) -> MutationStep {
        match &outcome {
            Ok(result) => info!(
                %action,
                matched = result.matched_count,
                modified = result.modified_count,
                "mutation committed"
            ),
            Err(e) => error!(%action, "mutation failed: {}", e),
        }

        MutationStep {
            action,
            outcome,
            members_after: self.display_all().await,
        }
    }
}
