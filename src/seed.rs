//! Fixture loading and collection seeding
//!
//! Fixtures are JSON files holding one parent document or an array of them.
//! Seeding validates every `Total_amount`, stores it as a double and rejects
//! duplicate `Member_ID`s within a `member` array.

use crate::error::{LoyaltyError, Result};
use crate::store::amount::coerce_amount;
use crate::store::mongo::{bounded, convert_mongodb_error};
use crate::store::LoyaltyDocument;
use mongodb::bson::{doc, from_document, Bson, Document};
use mongodb::Collection;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Parse fixture text into BSON documents without altering any value.
pub fn parse_fixture(text: &str) -> Result<Vec<Document>> {
    let json: JsonValue = serde_json::from_str(text)?;
    let values = match json {
        JsonValue::Array(values) => values,
        single @ JsonValue::Object(_) => vec![single],
        _ => {
            return Err(LoyaltyError::InvalidFixture(
                "expected a document or an array of documents".to_string(),
            ))
        }
    };

    values.into_iter().map(bson_from_json).collect()
}

pub fn read_fixture(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)?;
    parse_fixture(&text)
}

/// Validate ids and amounts, replacing text amounts with doubles.
pub fn normalize_document(document: &mut Document) -> Result<()> {
    if let Some(Bson::Array(members)) = document.get("member") {
        let mut seen = HashSet::new();
        for member in members {
            let id = member_id_of(member)?;
            if !seen.insert(id) {
                return Err(LoyaltyError::InvalidFixture(format!(
                    "duplicate Member_ID {} in member array",
                    id
                )));
            }
        }
    }

    if let Some(Bson::Array(records)) = document.get_mut("happy_hour_member") {
        for record in records.iter_mut() {
            let id = member_id_of(record)?;
            if let Bson::Document(record) = record {
                let raw = record.get("Total_amount").cloned().unwrap_or(Bson::Null);
                let amount = coerce_amount(id, &raw)?;
                record.insert("Total_amount", Bson::Double(amount));
            }
        }
    }

    Ok(())
}

pub fn normalize_documents(documents: &mut [Document]) -> Result<()> {
    documents.iter_mut().try_for_each(normalize_document)
}

/// Typed view of the fixture, used to back the in-memory store.
pub fn to_loyalty_documents(documents: Vec<Document>) -> Result<Vec<LoyaltyDocument>> {
    documents
        .into_iter()
        .map(|doc| from_document::<LoyaltyDocument>(doc).map_err(LoyaltyError::from))
        .collect()
}

/// Insert `documents`, first clearing the collection when `replace` is set.
pub async fn seed_collection(
    collection: &Collection<Document>,
    documents: Vec<Document>,
    replace: bool,
    limit: Duration,
) -> Result<usize> {
    if replace {
        let deleted = bounded(limit, "deleteMany", async {
            collection
                .delete_many(doc! {})
                .await
                .map_err(convert_mongodb_error)
        })
        .await?;
        info!(deleted = deleted.deleted_count, "collection cleared");
    }

    if documents.is_empty() {
        return Ok(0);
    }

    let inserted = bounded(limit, "insertMany", async {
        collection
            .insert_many(documents)
            .await
            .map_err(convert_mongodb_error)
    })
    .await?;

    let count = inserted.inserted_ids.len();
    info!(count, collection = %collection.name(), "fixture documents inserted");
    Ok(count)
}

fn member_id_of(value: &Bson) -> Result<i32> {
    let id = match value {
        Bson::Document(doc) => doc.get("Member_ID"),
        _ => None,
    };
    match id {
        Some(Bson::Int32(id)) => Ok(*id),
        Some(Bson::Int64(id)) => i32::try_from(*id)
            .map_err(|_| LoyaltyError::InvalidFixture(format!("Member_ID {} out of range", id))),
        _ => Err(LoyaltyError::InvalidFixture(format!(
            "record without an integer Member_ID: {}",
            value
        ))),
    }
}

/// Convert JSON to BSON Document
fn bson_from_json(json: JsonValue) -> Result<Document> {
    let bson = Bson::try_from(json)
        .map_err(|e| LoyaltyError::Serialization(format!("JSON to BSON error: {}", e)))?;

    if let Bson::Document(doc) = bson {
        Ok(doc)
    } else {
        Err(LoyaltyError::InvalidFixture(
            "expected a JSON object".to_string(),
        ))
    }
}
