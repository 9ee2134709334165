//! MongoDB Loyalty Store
//!
//! Connection bootstrap, named aggregation pipelines and the
//! [`LoyaltyStore`](crate::store::LoyaltyStore) implementation on top of the
//! official driver.

pub mod connection;
pub mod engine;
pub mod pipelines;

pub use connection::{connection_uri, redacted_uri, MongoConnection};
pub use engine::MongoLoyaltyStore;

use crate::error::{LoyaltyError, Result};
use std::future::Future;
use std::time::Duration;

/// MongoDB specific error conversion
pub(crate) fn convert_mongodb_error(err: mongodb::error::Error) -> LoyaltyError {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Authentication { .. } => {
            LoyaltyError::ClientCreationFailed(format!("Authentication failed: {}", err))
        }
        mongodb::error::ErrorKind::ConnectionPoolCleared { .. } => {
            LoyaltyError::ClientCreationFailed(format!("Connection pool cleared: {}", err))
        }
        mongodb::error::ErrorKind::ServerSelection { .. } => {
            LoyaltyError::ClientCreationFailed(format!("Server selection failed: {}", err))
        }
        mongodb::error::ErrorKind::InvalidArgument { .. } => {
            LoyaltyError::InvalidQuery(format!("Invalid argument: {}", err))
        }
        _ => LoyaltyError::QueryFailed(err.to_string()),
    }
}

/// Run `fut` with an upper bound on its duration.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LoyaltyError::Timeout(format!(
            "{} did not complete within {:?}",
            operation, limit
        ))),
    }
}
