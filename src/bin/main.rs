//! Quarry CLI - SQL over remote artifact datasets
//!
//! Usage:
//!   quarry serve
//!   quarry artifacts
//!   quarry query <artifact> <sql>
//!   quarry schema <artifact>
//!   quarry docs <artifact>
//!
//! Examples:
//!   quarry serve
//!   quarry query demo-dataset "SELECT * FROM dataset LIMIT 5"
//!   quarry schema demo-dataset

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quarry::artifact::{ArtifactStore, ServiceArtifactStore, ARTIFACT_MANAGER_SERVICE};
use quarry::config::Settings;
use quarry::rpc::{auth, RpcClient};
use quarry::service;
use quarry::session::SessionContext;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - run SQL against remote artifact datasets")]
#[command(version)]
struct Cli {
    /// Path to a config file (overrides the default search order)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, register the SQL service, and serve until interrupted
    Serve,

    /// List artifacts in the configured collection
    Artifacts,

    /// Run SQL against an artifact's dataset
    Query {
        /// Artifact id or display name
        artifact: String,

        /// SQL to execute
        sql: String,
    },

    /// Show the column structure of an artifact's dataset
    Schema {
        /// Artifact id or display name
        artifact: String,
    },

    /// Print an artifact's documentation file
    Docs {
        /// Artifact id or display name
        artifact: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve => cmd_serve(settings).await,
        Commands::Artifacts => cmd_artifacts(settings).await,
        Commands::Query { artifact, sql } => cmd_query(settings, &artifact, &sql).await,
        Commands::Schema { artifact } => cmd_schema(settings, &artifact).await,
        Commands::Docs { artifact } => cmd_docs(settings, &artifact).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(config: Option<&str>) -> Result<Settings, quarry::config::SettingsError> {
    match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

/// Connect to the server and build the session's collaborators.
async fn connect(
    settings: &Settings,
) -> Result<(RpcClient, Arc<dyn ArtifactStore>, Arc<SessionContext>), Box<dyn std::error::Error>> {
    let token = auth::resolve_token(settings).await?;
    let client = RpcClient::connect(settings, Some(&token)).await?;
    let store: Arc<dyn ArtifactStore> = Arc::new(ServiceArtifactStore::new(
        client.get_service(ARTIFACT_MANAGER_SERVICE),
    ));
    let session = Arc::new(SessionContext::new(settings.clone()));
    Ok((client, store, session))
}

async fn cmd_serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let (client, store, session) = connect(&settings).await?;

    // Bring the engine up eagerly so the first invocation is not the one
    // paying initialization cost.
    session.acquire_runtime().await?;
    service::register_session_service(&client, session.clone(), store).await?;

    println!(
        "Serving '{}' in workspace '{}'. Press Ctrl-C to stop.",
        settings.service.id, settings.server.workspace
    );
    tokio::signal::ctrl_c().await?;
    println!("Shutting down.");
    Ok(())
}

async fn cmd_artifacts(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let (_client, store, _session) = connect(&settings).await?;

    let artifacts = store.list(&settings.artifacts.collection).await?;
    if artifacts.is_empty() {
        println!("No artifacts in collection '{}'.", settings.artifacts.collection);
        return Ok(());
    }

    println!("Artifacts in '{}':", settings.artifacts.collection);
    for artifact in artifacts {
        match artifact.manifest.name.as_deref() {
            Some(name) => println!("  {} ({})", artifact.id, name),
            None => println!("  {}", artifact.id),
        }
    }
    Ok(())
}

async fn cmd_query(
    settings: Settings,
    artifact: &str,
    sql: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_client, store, session) = connect(&settings).await?;

    let result = service::ops::query(&session, &store, artifact, sql).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_schema(
    settings: Settings,
    artifact: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_client, store, session) = connect(&settings).await?;

    let result = service::ops::get_schema(&session, &store, artifact).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_docs(
    settings: Settings,
    artifact: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_client, store, session) = connect(&settings).await?;

    let docs = service::ops::get_docs(&session, &store, artifact).await?;
    if docs.is_empty() {
        println!("(no documentation)");
    } else {
        println!("{docs}");
    }
    Ok(())
}
