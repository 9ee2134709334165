//! Error types for the loyalty program store.

use thiserror::Error;

/// Result type alias for loyalty operations
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Error types for connection, query and mutation operations
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// The client could not be built, reached or authenticated
    #[error("Client creation failed: {0}")]
    ClientCreationFailed(String),

    /// The configured database is not visible to the client
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// The configured collection does not exist in the database
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// A spend amount could not be coerced to a non-negative decimal
    #[error("Malformed amount for member {member_id}: {raw:?}")]
    MalformedAmount { member_id: i32, raw: String },

    /// No parent document holds a `member` array matching the mutation
    #[error("Target document missing: {0}")]
    TargetDocumentMissing(String),

    /// Query or update rejected by the server
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Malformed query or update arguments
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A network call exceeded its configured bound
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fixture data violates the collection invariants
    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    /// BSON or JSON conversion error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoyaltyError {
    /// Connection and resolution errors end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoyaltyError::ClientCreationFailed(_)
                | LoyaltyError::DatabaseNotFound(_)
                | LoyaltyError::CollectionNotFound(_)
                | LoyaltyError::Configuration(_)
        )
    }
}

impl From<mongodb::bson::de::Error> for LoyaltyError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        LoyaltyError::Serialization(format!("BSON decode error: {}", err))
    }
}

impl From<mongodb::bson::ser::Error> for LoyaltyError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        LoyaltyError::Serialization(format!("BSON encode error: {}", err))
    }
}

impl From<serde_json::Error> for LoyaltyError {
    fn from(err: serde_json::Error) -> Self {
        LoyaltyError::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LoyaltyError::ClientCreationFailed("auth".to_string()).is_fatal());
        assert!(LoyaltyError::DatabaseNotFound("shop".to_string()).is_fatal());
        assert!(LoyaltyError::CollectionNotFound("coffe_shop".to_string()).is_fatal());
        assert!(!LoyaltyError::TargetDocumentMissing("member".to_string()).is_fatal());
        assert!(!LoyaltyError::MalformedAmount {
            member_id: 3,
            raw: "abc".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_malformed_amount_message() {
        let err = LoyaltyError::MalformedAmount {
            member_id: 7,
            raw: "12,5".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("member 7"));
        assert!(message.contains("12,5"));
    }
}
