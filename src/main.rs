use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loyalty_rs::{
    config::LoyaltyConfig,
    logging::{init_logging, LogConfig},
    report::{render_mutations, render_queries},
    seed,
    store::LoyaltyStore,
    LifecyclePlan, LoyaltyError, MemoryLoyaltyStore, MongoConnection, MutationEngine, QueryEngine,
};
use mongodb::bson::Document;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Exit status when every step ran but some of them failed
const PARTIAL_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "loyalty", version, about = "Coffee-shop loyalty queries and mutations over MongoDB", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, global = true, help = "Path to a config file (TOML). If omitted, loyalty.toml or config/loyalty.toml is tried.")]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true, env = "LOYALTY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the mutation lifecycle, then the six queries (default)")]
    Run {
        #[arg(long, help = "Run offline against a JSON fixture instead of MongoDB")]
        fixture: Option<PathBuf>,
    },
    #[command(about = "Insert fixture documents into the configured collection")]
    Seed {
        #[arg(long, help = "JSON file holding one document or an array of documents")]
        file: PathBuf,
        #[arg(long, help = "Delete every document in the collection first")]
        replace: bool,
    },
    #[command(name = "config-sample", about = "Write a sample configuration file")]
    ConfigSample {
        #[arg(long, default_value = "loyalty.toml.example")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::ConfigSample { output }) = &cli.command {
        return match LoyaltyConfig::generate_sample_config(output) {
            Ok(()) => {
                println!("Sample configuration written to {}", output.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match LoyaltyConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_config =
        LogConfig::from_logging_config(&config.logging).with_level(cli.log_level.as_deref());
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging disabled: {:#}", e);
            None
        }
    };

    let outcome = match cli.command {
        Some(Commands::Seed { file, replace }) => seed_command(&config, &file, replace).await,
        Some(Commands::Run { fixture }) => run_command(&config, fixture.as_deref()).await,
        None => run_command(&config, None).await,
        Some(Commands::ConfigSample { .. }) => Ok(0),
    };

    match outcome {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            warn!(failures, "finished with failed steps");
            ExitCode::from(PARTIAL_FAILURE)
        }
        Err(e) => {
            match e.downcast_ref::<LoyaltyError>() {
                Some(err) if err.is_fatal() => error!(fatal = true, "{}", err),
                _ => error!("{:#}", e),
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of failed steps and queries.
async fn run_command(config: &LoyaltyConfig, fixture: Option<&Path>) -> Result<usize> {
    match fixture {
        Some(path) => {
            let documents = seed::read_fixture(path)
                .with_context(|| format!("failed to read fixture {}", path.display()))?;
            let store = MemoryLoyaltyStore::with_documents(seed::to_loyalty_documents(documents)?);
            info!(fixture = %path.display(), "running against in-memory store");
            Ok(execute(&store, config).await?)
        }
        None => {
            let connection = MongoConnection::connect(&config.database).await?;
            let store = connection.store();
            let result = execute(&store, config).await;
            connection.close().await;
            Ok(result?)
        }
    }
}

async fn execute(store: &dyn LoyaltyStore, config: &LoyaltyConfig) -> io::Result<usize> {
    info!(backend = store.backend_name(), "starting mutation lifecycle");
    let steps = MutationEngine::new(store)
        .run_lifecycle(&LifecyclePlan::default())
        .await;

    let queries = QueryEngine::with_thresholds(store, config.queries.clone());
    let report = queries.run_all().await;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_mutations(&mut out, &steps)?;
    render_queries(&mut out, &report, queries.thresholds())?;
    out.flush()?;

    let failed_steps = steps.iter().filter(|step| step.outcome.is_err()).count();
    Ok(failed_steps + report.failures())
}

async fn seed_command(config: &LoyaltyConfig, file: &Path, replace: bool) -> Result<usize> {
    let mut documents = seed::read_fixture(file)
        .with_context(|| format!("failed to read fixture {}", file.display()))?;
    seed::normalize_documents(&mut documents)?;

    let database = &config.database;
    let client = MongoConnection::create_client(database).await?;
    let collection = client
        .database(&database.name)
        .collection::<Document>(&database.collection);

    let result = seed::seed_collection(
        &collection,
        documents,
        replace,
        database.operation_timeout(),
    )
    .await;
    client.shutdown().await;

    let count = result?;
    println!(
        "Seeded {} document(s) into {}.{}",
        count, database.name, database.collection
    );
    Ok(0)
}
