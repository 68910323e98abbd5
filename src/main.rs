use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kura::cache::{CacheStorage, RequestKey};
use kura::config::Config;
use kura::controller::OfflineCacheController;
use kura::logging::{self, LogFormat};
use kura::records::{NewUser, RecordStore};
use kura::KuraError;

const DEFAULT_CONFIG_FILE: &str = "kura.yaml";

/// Kura - offline asset cache with versioned buckets
#[derive(Parser, Debug)]
#[command(name = "kura")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to ./kura.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install the configured version, then activate it and sweep old buckets
    Install,
    /// Resolve requests through the active bucket (disk backend only)
    Fetch {
        /// Request paths or absolute URLs
        #[arg(required = true)]
        paths: Vec<String>,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
    /// List bucket versions in storage (disk backend only)
    Versions,
    /// Manage stored users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage stored tokens
    Tokens {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Update {
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    List,
    Add { token: String },
    Delete { id: u64 },
}

#[derive(Serialize)]
struct FetchOutcome {
    request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn load_config(path: Option<&Path>) -> Result<Config, KuraError> {
    let config = match path {
        Some(path) => Config::from_file(path).map_err(KuraError::Config)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Config::from_file(DEFAULT_CONFIG_FILE).map_err(KuraError::Config)?
        }
        None => Config::default(),
    };
    config.validate().map_err(KuraError::Config)?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), KuraError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| KuraError::Internal(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

async fn run(config: Config, command: Command) -> Result<(), KuraError> {
    let version = config.cache_version();

    match command {
        Command::Install => {
            let controller = OfflineCacheController::new(
                config.build_storage().await?,
                Arc::new(config.build_network()?),
                config.fetch.clone(),
            )
            .with_origin(&config.network.origin);
            let install = controller.on_install(&config.manifest, &version).await?;
            let activate = controller.on_activate(&version).await?;
            print_json(&serde_json::json!({ "install": install, "activate": activate }))
        }
        Command::Fetch { paths, method } => {
            config
                .require_persistent_storage("fetch")
                .map_err(KuraError::Config)?;
            let controller = OfflineCacheController::resume(
                config.build_storage().await?,
                Arc::new(config.build_network()?),
                config.fetch.clone(),
                &version,
            )
            .await?
            .with_origin(&config.network.origin);

            let requests = paths
                .iter()
                .map(|path| RequestKey::new(&method, path))
                .collect::<Result<Vec<_>, _>>()?;
            let results = join_all(requests.iter().map(|r| controller.on_fetch(r))).await;
            controller.settle_write_backs().await;

            let outcomes: Vec<FetchOutcome> = requests
                .iter()
                .zip(results)
                .map(|(request, result)| match result {
                    Ok(snapshot) => FetchOutcome {
                        request: request.to_string(),
                        status: Some(snapshot.status),
                        bytes: Some(snapshot.body.len()),
                        content_type: snapshot.content_type().map(str::to_string),
                        error: None,
                    },
                    Err(e) => FetchOutcome {
                        request: request.to_string(),
                        status: None,
                        bytes: None,
                        content_type: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            print_json(&serde_json::json!({ "results": outcomes, "stats": controller.stats() }))
        }
        Command::Versions => {
            config
                .require_persistent_storage("versions")
                .map_err(KuraError::Config)?;
            let storage = config.build_storage().await?;
            let versions = storage.list_versions().await?;
            print_json(&serde_json::json!({ "configured": version, "versions": versions }))
        }
        Command::Users { action } => {
            let store = RecordStore::open(config.records_path()).await?;
            match action {
                UserAction::List => print_json(&store.users().await),
                UserAction::Add { name, email } => {
                    let id = store.add_user(NewUser { name, email }).await?;
                    print_json(&serde_json::json!({ "id": id }))
                }
                UserAction::Update { id, name, email } => {
                    let user = store.update_user(id, NewUser { name, email }).await?;
                    print_json(&user)
                }
                UserAction::Delete { id } => {
                    let deleted = store.delete_user(id).await?;
                    print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
                }
            }
        }
        Command::Tokens { action } => {
            let store = RecordStore::open(config.records_path()).await?;
            match action {
                TokenAction::List => print_json(&store.tokens().await),
                TokenAction::Add { token } => {
                    let id = store.add_token(token).await?;
                    print_json(&serde_json::json!({ "id": id }))
                }
                TokenAction::Delete { id } => {
                    let deleted = store.delete_token(id).await?;
                    print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init_with_format(args.log_format) {
        eprintln!("Failed to initialize logging subsystem: {}", e);
        std::process::exit(1);
    }

    let config = load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        version = %config.cache_version(),
        manifest_entries = config.manifest.len(),
        origin = %config.network.origin,
        backend = ?config.cache.storage.backend,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("configuration OK");
        return;
    }

    let Some(command) = args.command else {
        eprintln!("No command given; see --help");
        std::process::exit(2);
    };

    if let Err(e) = run(config, command).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
