//! findex CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use findex::{
    commands::{
        cmd_index, cmd_init, cmd_query, cmd_rebuild, cmd_remove, cmd_scan, cmd_status, cmd_use,
        print_index_stats, print_init, print_query_results, print_scan_stats, print_status,
        InitOptions, ScanOptions,
    },
    config::Config,
    error::{Error, Result},
    meta::MetaDb,
    progress::LogWriterFactory,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "findex")]
#[command(version, about = "Local file indexer with ranked keyword and full-text search", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize findex configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,

        /// Directories to keep indexed (defaults to Documents, Desktop, Downloads)
        #[arg(long = "watch")]
        watch: Vec<PathBuf>,
    },

    /// Scan watch paths: cleanup, full scan of new roots, reconciliation of the rest
    Scan {
        /// Skip content extraction
        #[arg(long)]
        skip_content: bool,
    },

    /// Search the index
    Query {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show index status
    Status,

    /// Forget scan progress so every root is rescanned from scratch
    Rebuild,

    /// Remove files or directories from the index
    Remove {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Also drop scan markers so removed roots are rescanned as new
        #[arg(long)]
        forget_scan: bool,
    },

    /// Record that a file was opened (feeds ranking)
    Use {
        path: PathBuf,
    },

    /// Index or refresh specific files
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    let command = match cli.command {
        Commands::Init { force, watch } => {
            let options = InitOptions {
                base_dir: base_dir_for(cli.config.as_deref()),
                force,
                watch_paths: watch,
            };
            let config = match cmd_init(options).await {
                Err(Error::AlreadyInitialized(path)) => {
                    eprintln!("Config file already exists at: {}\nUse --force to overwrite.", path);
                    std::process::exit(1);
                }
                other => other?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print_init(&config);
            }
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "findex", &mut std::io::stdout());
            return Ok(());
        }
        command => command,
    };

    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::connect(&config).await?;

    match command {
        Commands::Init { .. } | Commands::Completions { .. } => {}

        Commands::Scan { skip_content } => {
            let stats = cmd_scan(&config, &db, ScanOptions { skip_content }).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_scan_stats(&stats);
            }
        }

        Commands::Query { query, limit } => {
            let result = cmd_query(&config, &db, &query, limit).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_query_results(&result);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Rebuild => {
            let cleared = cmd_rebuild(&config, &db).await?;
            if cli.json {
                println!(r#"{{"cleared_roots": {}}}"#, cleared);
            } else {
                println!("✓ Cleared {} scan markers; run 'findex scan' to rebuild", cleared);
            }
        }

        Commands::Remove { paths, forget_scan } => {
            let removed = cmd_remove(&config, &db, &absolute(paths)?, forget_scan).await?;
            if cli.json {
                println!(r#"{{"removed": {}}}"#, removed);
            } else {
                println!("✓ Removed {} files from the index", removed);
            }
        }

        Commands::Use { path } => {
            let path = absolute(vec![path])?.remove(0);
            cmd_use(&db, &path.to_string_lossy()).await?;
            if !cli.json {
                println!("✓ Recorded use of {}", path.display());
            }
        }

        Commands::Index { paths } => {
            let stats = cmd_index(&config, &db, &absolute(paths)?).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
        }
    }

    Ok(())
}

/// Data directory for `init`: the parent of a `.toml` path, or the directory itself
fn base_dir_for(config: Option<&Path>) -> Option<PathBuf> {
    config.map(|path| {
        if path.extension().is_some_and(|e| e == "toml") {
            path.parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir)
        } else {
            path.to_path_buf()
        }
    })
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'findex init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}

/// Resolve relative CLI paths against the working directory
fn absolute(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let cwd = std::env::current_dir()?;
    Ok(paths
        .into_iter()
        .map(|p| {
            let joined = if p.is_absolute() { p } else { cwd.join(p) };
            std::fs::canonicalize(&joined).unwrap_or(joined)
        })
        .collect())
}
