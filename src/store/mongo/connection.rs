//! MongoDB Connection Provider
//!
//! Builds the client from an immutable [`DatabaseConfig`], pins the stable
//! server API and resolves the configured database and collection.

use super::{bounded, convert_mongodb_error, engine::MongoLoyaltyStore};
use crate::config::DatabaseConfig;
use crate::error::{LoyaltyError, Result};
use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection, Database,
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Open client plus the resolved collection handle
pub struct MongoConnection {
    client: Client,
    collection: Collection<Document>,
    operation_timeout: Duration,
}

impl MongoConnection {
    /// Create the client and resolve database and collection.
    ///
    /// If resolution fails the client is shut down before the error returns.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = Self::create_client(config).await?;
        let limit = config.operation_timeout();

        let resolved = async {
            let database = Self::resolve_database(&client, &config.name, limit).await?;
            Self::resolve_collection(&database, &config.collection, limit).await
        }
        .await;

        match resolved {
            Ok(collection) => {
                info!(
                    database = %config.name,
                    collection = %config.collection,
                    "connected to MongoDB"
                );
                Ok(Self {
                    client,
                    collection,
                    operation_timeout: limit,
                })
            }
            Err(e) => {
                warn!("releasing client after failed resolution: {}", e);
                client.shutdown().await;
                Err(e)
            }
        }
    }

    /// Build a client pinned to server API V1 and verify it with a ping.
    pub async fn create_client(config: &DatabaseConfig) -> Result<Client> {
        config.validate()?;
        let uri = connection_uri(config);
        let limit = config.operation_timeout();
        debug!(uri = %redacted_uri(config), "creating MongoDB client");

        let mut client_options = bounded(limit, "connection string parsing", async {
            ClientOptions::parse(uri.expose_secret())
                .await
                .map_err(|e| LoyaltyError::ClientCreationFailed(format!("Invalid connection string: {}", e)))
        })
        .await?;

        client_options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        client_options.connect_timeout = Some(config.connect_timeout());
        client_options.server_selection_timeout = Some(config.server_selection_timeout());
        if let Some(ref app_name) = config.app_name {
            client_options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(client_options)
            .map_err(|e| LoyaltyError::ClientCreationFailed(e.to_string()))?;

        let ping = bounded(limit, "ping", async {
            client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(|e| LoyaltyError::ClientCreationFailed(format!("Ping failed: {}", e)))
        })
        .await;

        match ping {
            Ok(_) => Ok(client),
            Err(e) => {
                client.shutdown().await;
                Err(match e {
                    LoyaltyError::Timeout(message) => LoyaltyError::ClientCreationFailed(message),
                    other => other,
                })
            }
        }
    }

    pub async fn resolve_database(client: &Client, name: &str, limit: Duration) -> Result<Database> {
        let names = bounded(limit, "listDatabases", async {
            client
                .list_database_names()
                .await
                .map_err(convert_mongodb_error)
        })
        .await?;

        if names.iter().any(|n| n == name) {
            Ok(client.database(name))
        } else {
            Err(LoyaltyError::DatabaseNotFound(name.to_string()))
        }
    }

    pub async fn resolve_collection(
        database: &Database,
        name: &str,
        limit: Duration,
    ) -> Result<Collection<Document>> {
        let names = bounded(limit, "listCollections", async {
            database
                .list_collection_names()
                .await
                .map_err(convert_mongodb_error)
        })
        .await?;

        if names.iter().any(|n| n == name) {
            Ok(database.collection::<Document>(name))
        } else {
            Err(LoyaltyError::CollectionNotFound(format!(
                "{}.{}",
                database.name(),
                name
            )))
        }
    }

    /// Store over the resolved collection
    pub fn store(&self) -> MongoLoyaltyStore {
        MongoLoyaltyStore::new(self.collection.clone(), self.operation_timeout)
    }

    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    /// Release the client and its pooled connections
    pub async fn close(self) {
        self.client.shutdown().await;
        debug!("MongoDB client shut down");
    }
}

/// Connection string with percent-encoded credentials.
pub fn connection_uri(config: &DatabaseConfig) -> SecretString {
    let credentials = config.credentials();
    let uri = match config.uri {
        Some(ref uri) => uri.clone(),
        None => build_uri(
            config,
            &credentials.username,
            &urlencoding::encode(credentials.password.expose_secret()),
        ),
    };
    SecretString::new(uri.into_boxed_str())
}

/// Connection string safe for logs
pub fn redacted_uri(config: &DatabaseConfig) -> String {
    match config.uri {
        Some(ref uri) => redact_userinfo(uri),
        None => build_uri(config, &config.username, "****"),
    }
}

fn build_uri(config: &DatabaseConfig, username: &str, password: &str) -> String {
    let mut uri = format!("{}://", config.scheme);
    if !username.is_empty() {
        uri.push_str(&format!("{}:{}@", urlencoding::encode(username), password));
    }
    uri.push_str(&config.host);
    uri.push('/');
    if let Some(ref app_name) = config.app_name {
        uri.push_str(&format!("?appName={}", urlencoding::encode(app_name)));
    }
    uri
}

/// Treats everything before the last `@` as userinfo, so a password holding a
/// raw `/`, `?` or `@` stays hidden. An `@` in the options over-redacts.
fn redact_userinfo(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    match rest.rfind('@') {
        Some(at) => {
            let user = rest[..at].split(':').next().unwrap_or_default();
            format!("{}://{}:****@{}", scheme, user, &rest[at + 1..])
        }
        None => uri.to_string(),
    }
}
