//! In-process loyalty store
//!
//! Evaluates every operation over parent documents held in memory, with the
//! same matching, join and update rules as the server-side pipelines.

use crate::error::{LoyaltyError, Result};
use crate::store::amount::mean;
use crate::store::{LoyaltyDocument, LoyaltyStore, Member, MemberName, MutationOutcome, SpendRow};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryLoyaltyStore {
    documents: RwLock<Vec<LoyaltyDocument>>,
}

impl MemoryLoyaltyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<LoyaltyDocument>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Copy of the current documents
    pub async fn snapshot(&self) -> Vec<LoyaltyDocument> {
        self.documents.read().await.clone()
    }

    async fn collect_members<F>(&self, predicate: F) -> Vec<Member>
    where
        F: Fn(&Member) -> bool + Send,
    {
        let documents = self.documents.read().await;
        documents
            .iter()
            .flat_map(|doc| doc.member.iter().flatten())
            .filter(|member| predicate(member))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LoyaltyStore for MemoryLoyaltyStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn average_age(&self) -> Result<f64> {
        let members = self.collect_members(|_| true).await;
        Ok(mean(members.iter().map(|m| f64::from(m.age))))
    }

    async fn members_by_level_and_age(&self, min_level: i32, older_than: i32) -> Result<Vec<Member>> {
        Ok(self
            .collect_members(|m| m.level_of_membership >= min_level && m.age > older_than)
            .await)
    }

    async fn spend_rows(&self) -> Result<Vec<SpendRow>> {
        let documents = self.documents.read().await;
        let mut rows = Vec::new();
        for doc in documents.iter() {
            let members = doc.member.as_deref().unwrap_or_default();
            for record in doc.happy_hour_member.iter().flatten() {
                for member in members.iter().filter(|m| m.member_id == record.member_id) {
                    rows.push(SpendRow {
                        member_id: record.member_id,
                        name: Some(member.name.clone()),
                        total_amount: record.total_amount.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn happy_hour_amounts(&self) -> Result<Vec<SpendRow>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .flat_map(|doc| doc.happy_hour_member.iter().flatten())
            .map(|record| SpendRow {
                member_id: record.member_id,
                name: None,
                total_amount: record.total_amount.clone(),
            })
            .collect())
    }

    async fn long_purchases(&self, minutes: i32) -> Result<Vec<MemberName>> {
        let mut names: Vec<MemberName> = self
            .collect_members(|m| m.time_of_purchase > minutes)
            .await
            .into_iter()
            .map(|m| MemberName { name: m.name })
            .collect();
        names.sort();
        Ok(names)
    }

    async fn members_with_card(&self, card: &str) -> Result<Vec<Member>> {
        Ok(self.collect_members(|m| m.membership_card == card).await)
    }

    async fn push_member(&self, member: &Member) -> Result<MutationOutcome> {
        let mut documents = self.documents.write().await;
        let target = documents
            .iter_mut()
            .find_map(|doc| doc.member.as_mut())
            .ok_or_else(|| {
                LoyaltyError::TargetDocumentMissing("no document holds a member array".to_string())
            })?;

        target.push(member.clone());
        Ok(MutationOutcome {
            matched_count: 1,
            modified_count: 1,
        })
    }

    async fn set_purchase_time(&self, name: &str, minutes: i32) -> Result<MutationOutcome> {
        let mut documents = self.documents.write().await;
        let target = documents
            .iter_mut()
            .filter_map(|doc| doc.member.as_mut())
            .find(|members| members.iter().any(|m| m.name == name))
            .ok_or_else(|| LoyaltyError::TargetDocumentMissing(format!("no member named {:?}", name)))?;

        let mut changed = false;
        for member in target.iter_mut().filter(|m| m.name == name) {
            if member.time_of_purchase != minutes {
                member.time_of_purchase = minutes;
                changed = true;
            }
        }

        Ok(MutationOutcome {
            matched_count: 1,
            modified_count: u64::from(changed),
        })
    }

    async fn pull_by_purchase_time(&self, minutes: i32) -> Result<MutationOutcome> {
        let mut documents = self.documents.write().await;
        let target = documents
            .iter_mut()
            .find_map(|doc| doc.member.as_mut())
            .ok_or_else(|| {
                LoyaltyError::TargetDocumentMissing("no document holds a member array".to_string())
            })?;

        let before = target.len();
        target.retain(|m| m.time_of_purchase != minutes);

        Ok(MutationOutcome {
            matched_count: 1,
            modified_count: u64::from(target.len() != before),
        })
    }

    async fn first_document_members(&self) -> Result<Vec<Member>> {
        let documents = self.documents.read().await;
        Ok(documents
            .first()
            .and_then(|doc| doc.member.clone())
            .unwrap_or_default())
    }
}
