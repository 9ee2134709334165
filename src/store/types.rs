//! Loyalty Program Document Types
//!
//! Members, happy-hour spend records and the typed rows returned by queries

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// Loyalty-program participant, one element of the `member` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "Member_ID")]
    pub member_id: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Membership_card")]
    pub membership_card: String,
    #[serde(rename = "Age")]
    pub age: i32,
    /// Minutes spent on the purchase
    #[serde(rename = "Time_of_purchase")]
    pub time_of_purchase: i32,
    #[serde(rename = "Level_of_membership")]
    pub level_of_membership: i32,
    #[serde(rename = "Address", default)]
    pub address: String,
}

/// Spend event, one element of the `happy_hour_member` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HappyHourRecord {
    #[serde(rename = "HH_ID", default, skip_serializing_if = "Option::is_none")]
    pub hh_id: Option<i32>,
    #[serde(rename = "Member_ID")]
    pub member_id: i32,
    /// Either legacy text (`"5.43"`) or a number once normalized
    #[serde(rename = "Total_amount")]
    pub total_amount: Bson,
}

/// Parent document holding both embedded arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Vec<Member>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub happy_hour_member: Option<Vec<HappyHourRecord>>,
}

/// Spend record joined with its member, before amount coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendRow {
    #[serde(rename = "Member_ID")]
    pub member_id: i32,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Total_amount")]
    pub total_amount: Bson,
}

/// Member whose happy-hour spend exceeded the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighSpender {
    pub member_id: i32,
    pub name: String,
    pub total: f64,
}

/// Name-only projection of a member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberName {
    #[serde(rename = "Name")]
    pub name: String,
}

/// Result of one array mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// Parent documents selected by the outer filter
    pub matched_count: u64,
    /// Parent documents actually changed
    pub modified_count: u64,
}
