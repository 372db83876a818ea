//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Data directory; defaults to `~/.findex`
    pub base_dir: Option<PathBuf>,
    pub force: bool,
    /// Watch roots to store instead of the defaults
    pub watch_paths: Vec<PathBuf>,
}

/// Write the config file and create the index database
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(options.base_dir);

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    if !options.watch_paths.is_empty() {
        let cwd = std::env::current_dir()?;
        config.watch_paths = options
            .watch_paths
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { cwd.join(p) })
            .collect();
    }

    config.validate()?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    db.ensure_indexes().await?;

    info!("Initialized findex at {:?}", config.paths.base_dir);
    Ok(config)
}

/// Print init summary to console
pub fn print_init(config: &Config) {
    println!("✓ findex initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("  Watch paths:");
    for path in &config.watch_paths {
        println!("    • {}", path.display());
    }
    println!("\nNext steps:");
    println!("  1. Edit the config file to adjust watch paths and filters");
    println!("  2. Build the index: findex scan");
    println!("  3. Search: findex query \"quarterly report\"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let options = InitOptions {
            base_dir: Some(tmp.path().join("data")),
            force: false,
            watch_paths: vec![tmp.path().to_path_buf()],
        };

        let config = cmd_init(options.clone()).await.unwrap();
        assert!(config.is_initialized());
        assert_eq!(config.watch_paths, vec![tmp.path().to_path_buf()]);

        assert!(matches!(
            cmd_init(options.clone()).await,
            Err(Error::AlreadyInitialized(_))
        ));
        assert!(cmd_init(InitOptions { force: true, ..options }).await.is_ok());
    }
}
