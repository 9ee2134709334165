//! Query Engine
//!
//! The six read-only queries. Each one is independent: a failure in one
//! (a malformed amount, a timeout) is recorded in the [`QueryReport`] and
//! the others still run.

use crate::error::{LoyaltyError, Result};
use crate::store::amount::{average_spend_from_rows, high_spenders_from_rows};
use crate::store::{HighSpender, LoyaltyStore, Member, MemberName};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Bounds used by the filtering queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryThresholds {
    /// Keep spends strictly above this amount
    pub high_spend_threshold: f64,
    /// Keep purchases strictly longer than this many minutes
    pub long_purchase_minutes: i32,
    /// Inclusive minimum membership level
    pub min_level: i32,
    /// Exclusive minimum age
    pub older_than: i32,
    pub card: String,
}

impl Default for QueryThresholds {
    fn default() -> Self {
        Self {
            high_spend_threshold: 5.1,
            long_purchase_minutes: 15,
            min_level: 4,
            older_than: 35,
            card: "Black".to_string(),
        }
    }
}

impl QueryThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.high_spend_threshold.is_finite() || self.high_spend_threshold < 0.0 {
            return Err(LoyaltyError::Configuration(format!(
                "high_spend_threshold must be a non-negative number, got {}",
                self.high_spend_threshold
            )));
        }
        if self.card.is_empty() {
            return Err(LoyaltyError::Configuration(
                "Membership card cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of every query, in execution order
#[derive(Debug)]
pub struct QueryReport {
    pub average_age: Result<f64>,
    pub members_by_level_and_age: Result<Vec<Member>>,
    pub high_spenders: Result<Vec<HighSpender>>,
    pub average_happy_hour_spend: Result<f64>,
    pub long_purchases: Result<Vec<MemberName>>,
    pub black_card_members: Result<Vec<Member>>,
}

impl QueryReport {
    pub fn failures(&self) -> usize {
        [
            self.average_age.is_err(),
            self.members_by_level_and_age.is_err(),
            self.high_spenders.is_err(),
            self.average_happy_hour_spend.is_err(),
            self.long_purchases.is_err(),
            self.black_card_members.is_err(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }
}

pub struct QueryEngine<'a> {
    store: &'a dyn LoyaltyStore,
    thresholds: QueryThresholds,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a dyn LoyaltyStore) -> Self {
        Self::with_thresholds(store, QueryThresholds::default())
    }

    pub fn with_thresholds(store: &'a dyn LoyaltyStore, thresholds: QueryThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn thresholds(&self) -> &QueryThresholds {
        &self.thresholds
    }

    pub async fn average_age(&self) -> Result<f64> {
        self.store.average_age().await
    }

    pub async fn members_by_level_and_age(&self) -> Result<Vec<Member>> {
        self.store
            .members_by_level_and_age(self.thresholds.min_level, self.thresholds.older_than)
            .await
    }

    /// Spend records above the threshold, joined with their member's name.
    pub async fn high_spenders(&self) -> Result<Vec<HighSpender>> {
        let rows = self.store.spend_rows().await?;
        high_spenders_from_rows(rows, self.thresholds.high_spend_threshold)
    }

    pub async fn average_happy_hour_spend(&self) -> Result<f64> {
        let rows = self.store.happy_hour_amounts().await?;
        average_spend_from_rows(&rows)
    }

    /// Names sorted ascending, whatever order the backend produced.
    pub async fn long_purchases(&self) -> Result<Vec<MemberName>> {
        let mut names = self
            .store
            .long_purchases(self.thresholds.long_purchase_minutes)
            .await?;
        names.sort();
        Ok(names)
    }

    pub async fn black_card_members(&self) -> Result<Vec<Member>> {
        self.store.members_with_card(&self.thresholds.card).await
    }

    pub async fn run_all(&self) -> QueryReport {
        debug!(backend = self.store.backend_name(), "running queries");
        let report = QueryReport {
            average_age: self.average_age().await,
            members_by_level_and_age: self.members_by_level_and_age().await,
            high_spenders: self.high_spenders().await,
            average_happy_hour_spend: self.average_happy_hour_spend().await,
            long_purchases: self.long_purchases().await,
            black_card_members: self.black_card_members().await,
        };

        let failures = report.failures();
        if failures > 0 {
            warn!(failures, "some queries failed");
        }
        report
    }
}
