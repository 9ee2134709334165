//! MongoDB Loyalty Store Implementation
//!
//! Reads run as server-side aggregation pipelines; writes are single
//! `updateOne` calls against the parent document.

use super::{bounded, convert_mongodb_error, pipelines};
use crate::error::{LoyaltyError, Result};
use crate::store::{LoyaltyStore, Member, MemberName, MutationOutcome, SpendRow};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, from_bson, from_document, to_document, Bson, Document},
    options::UpdateOptions,
    Collection,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Loyalty store backed by a MongoDB collection
#[derive(Clone)]
pub struct MongoLoyaltyStore {
    collection: Collection<Document>,
    operation_timeout: Duration,
}

impl MongoLoyaltyStore {
    pub fn new(collection: Collection<Document>, operation_timeout: Duration) -> Self {
        Self {
            collection,
            operation_timeout,
        }
    }

    async fn aggregate(&self, operation: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        debug!(operation, stages = pipeline.len(), "running aggregation");
        bounded(self.operation_timeout, operation, async {
            let cursor = self
                .collection
                .aggregate(pipeline)
                .await
                .map_err(convert_mongodb_error)?;
            cursor
                .try_collect::<Vec<Document>>()
                .await
                .map_err(convert_mongodb_error)
        })
        .await
    }

    async fn aggregate_as<T: DeserializeOwned>(
        &self,
        operation: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<T>> {
        self.aggregate(operation, pipeline)
            .await?
            .into_iter()
            .map(|doc| from_document::<T>(doc).map_err(LoyaltyError::from))
            .collect()
    }

    async fn update_one(
        &self,
        operation: &str,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> Result<MutationOutcome> {
        let result = bounded(self.operation_timeout, operation, async {
            self.collection
                .update_one(filter, update)
                .with_options(options)
                .await
                .map_err(convert_mongodb_error)
        })
        .await?;

        let outcome = MutationOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        };
        info!(
            operation,
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            "update applied"
        );
        Ok(outcome)
    }
}

/// Numeric value of an accumulator result, `0.0` for null or missing
fn accumulated_number(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}

#[async_trait]
impl LoyaltyStore for MongoLoyaltyStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn average_age(&self) -> Result<f64> {
        let results = self.aggregate("averageAge", pipelines::average_age()).await?;
        Ok(accumulated_number(
            results.first().and_then(|doc| doc.get(pipelines::AVERAGE_FIELD)),
        ))
    }

    async fn members_by_level_and_age(&self, min_level: i32, older_than: i32) -> Result<Vec<Member>> {
        self.aggregate_as(
            "membersByLevelAndAge",
            pipelines::members_by_level_and_age(min_level, older_than),
        )
        .await
    }

    async fn spend_rows(&self) -> Result<Vec<SpendRow>> {
        self.aggregate_as("spendRows", pipelines::spend_rows()).await
    }

    async fn happy_hour_amounts(&self) -> Result<Vec<SpendRow>> {
        self.aggregate_as("happyHourAmounts", pipelines::happy_hour_amounts())
            .await
    }

    async fn long_purchases(&self, minutes: i32) -> Result<Vec<MemberName>> {
        self.aggregate_as("longPurchases", pipelines::long_purchases(minutes))
            .await
    }

    async fn members_with_card(&self, card: &str) -> Result<Vec<Member>> {
        self.aggregate_as("membersWithCard", pipelines::members_with_card(card))
            .await
    }

    async fn push_member(&self, member: &Member) -> Result<MutationOutcome> {
        let outcome = self
            .update_one(
                "pushMember",
                pipelines::member_array_filter(),
                pipelines::push_member_update(to_document(member)?),
                None,
            )
            .await?;

        if outcome.matched_count == 0 {
            return Err(LoyaltyError::TargetDocumentMissing(
                "no document holds a member array".to_string(),
            ));
        }
        Ok(outcome)
    }

    async fn set_purchase_time(&self, name: &str, minutes: i32) -> Result<MutationOutcome> {
        let mut options = UpdateOptions::default();
        options.array_filters = Some(pipelines::set_purchase_time_array_filters(name));

        let outcome = self
            .update_one(
                "setPurchaseTime",
                pipelines::name_filter(name),
                pipelines::set_purchase_time_update(minutes),
                Some(options),
            )
            .await?;

        if outcome.matched_count == 0 {
            return Err(LoyaltyError::TargetDocumentMissing(format!(
                "no member named {:?}",
                name
            )));
        }
        Ok(outcome)
    }

    async fn pull_by_purchase_time(&self, minutes: i32) -> Result<MutationOutcome> {
        let outcome = self
            .update_one(
                "pullByPurchaseTime",
                pipelines::member_array_filter(),
                pipelines::pull_by_purchase_time_update(minutes),
                None,
            )
            .await?;

        if outcome.matched_count == 0 {
            return Err(LoyaltyError::TargetDocumentMissing(
                "no document holds a member array".to_string(),
            ));
        }
        Ok(outcome)
    }

    async fn first_document_members(&self) -> Result<Vec<Member>> {
        let first = bounded(self.operation_timeout, "findFirst", async {
            self.collection
                .find_one(doc! {})
                .await
                .map_err(convert_mongodb_error)
        })
        .await?;

        match first.and_then(|doc| doc.get(pipelines::MEMBER_ARRAY).cloned()) {
            Some(members @ Bson::Array(_)) => Ok(from_bson::<Vec<Member>>(members)?),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulated_number() {
        assert_eq!(accumulated_number(Some(&Bson::Double(41.5))), 41.5);
        assert_eq!(accumulated_number(Some(&Bson::Int32(40))), 40.0);
        assert_eq!(accumulated_number(Some(&Bson::Null)), 0.0);
        assert_eq!(accumulated_number(None), 0.0);
    }
}
