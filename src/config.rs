use crate::error::{LoyaltyError, Result};
use crate::query::QueryThresholds;
use anyhow::Context;
use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables read directly, outside the `LOYALTY_` prefix.
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_URI: &str = "DB_URI";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoyaltyConfig {
    pub database: DatabaseConfig,
    pub queries: QueryThresholds,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection string scheme, `mongodb+srv` for hosted clusters
    pub scheme: String,
    /// Cluster address, e.g. `cluster0.example.mongodb.net`
    pub host: String,
    /// Full connection string; replaces scheme, host and credentials when set
    pub uri: Option<String>,
    pub name: String,
    pub collection: String,
    pub username: String,
    pub password: String,
    pub app_name: Option<String>,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
    /// Bound applied to every individual network call
    pub operation_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    pub console: bool,
    pub file: bool,
    pub dir: Option<PathBuf>,
    /// daily, hourly or never
    pub rotation: String,
}

/// Username and password with the secret kept out of `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queries: QueryThresholds::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            scheme: "mongodb+srv".to_string(),
            host: String::new(),
            uri: None,
            name: "loyalty".to_string(),
            collection: "coffee_shop".to_string(),
            username: String::new(),
            password: String::new(),
            app_name: Some("loyalty-rs".to_string()),
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            operation_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: false,
            dir: None,
            rotation: "daily".to_string(),
        }
    }
}

impl LoyaltyConfig {
    /// Load defaults, then the config file, then `LOYALTY_*` variables, then
    /// the plain `DB_*` / `COLLECTION_NAME` variables.
    ///
    /// The database section is validated when a connection is made, so an
    /// offline run needs no cluster settings.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&LoyaltyConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("loyalty").required(false))
                .add_source(File::with_name("config/loyalty").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("LOYALTY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: LoyaltyConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.queries.validate()?;

        Ok(config)
    }

    /// Apply the plain environment variables through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;
        if let Some(name) = lookup(ENV_DB_NAME) {
            db.name = name;
        }
        if let Some(user) = lookup(ENV_DB_USER) {
            db.username = user;
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            db.password = password;
        }
        if let Some(collection) = lookup(ENV_COLLECTION_NAME) {
            db.collection = collection;
        }
        if let Some(host) = lookup(ENV_DB_HOST) {
            db.host = host;
        }
        if let Some(uri) = lookup(ENV_DB_URI) {
            db.uri = Some(uri);
        }
    }

    /// Write an annotated sample configuration to `path`.
    pub fn generate_sample_config(path: &Path) -> anyhow::Result<()> {
        let mut sample = LoyaltyConfig::default();
        sample.database.host = "cluster0.example.mongodb.net".to_string();
        sample.database.username = "your_username".to_string();
        sample.database.password = "your_password".to_string();

        let toml_content = toml::to_string_pretty(&sample)?;
        let content = format!(
            r#"# loyalty-rs configuration
#
# Save as loyalty.toml, or pass --config <file>.
# Every key can be overridden with LOYALTY_<SECTION>__<KEY>, e.g.
# LOYALTY_DATABASE__HOST=cluster0.example.mongodb.net
# DB_NAME, DB_USER, DB_PASSWORD and COLLECTION_NAME override the
# matching [database] keys last.

{}"#,
            toml_content
        );

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LoyaltyError::Configuration(
                "Database name cannot be empty".to_string(),
            ));
        }
        if self.collection.is_empty() {
            return Err(LoyaltyError::Configuration(
                "Collection name cannot be empty".to_string(),
            ));
        }
        match &self.uri {
            Some(uri) if uri.is_empty() => Err(LoyaltyError::Configuration(
                "Connection URI cannot be empty".to_string(),
            )),
            Some(_) => Ok(()),
            None if self.host.is_empty() => Err(LoyaltyError::Configuration(
                "Cluster host cannot be empty (set DB_HOST or DB_URI)".to_string(),
            )),
            None => Ok(()),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: SecretString::new(self.password.clone().into_boxed_str()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
