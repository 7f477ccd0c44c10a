//! Model Assets CLI
//!
//! Main entry point for the `model-assets` binary: fetch, list and resolve
//! assets, and deploy models for TensorFlow Serving.

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_assets_core::{AssetSpecifier, AssetVersion, ResolutionMode};
use model_assets_service::{deploy_tf_models, AssetsManager, ModelsConfiguration};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info};

use config::CliConfig;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an asset into the local cache if necessary
    Fetch {
        /// Asset specifier, e.g. `category/model:1.2[weights.bin]`
        spec: AssetSpecifier,

        /// Download again even if the asset is cached
        #[arg(long)]
        download: bool,
    },

    /// List every asset of the remote store and its versions
    List,

    /// Print where an asset resolves to
    Resolve {
        /// Asset specifier
        spec: AssetSpecifier,

        /// local-docker, local-process or remote
        #[arg(long, default_value = "local-process", value_parser = parse_mode)]
        mode: ResolutionMode,
    },

    /// Write a TensorFlow Serving configuration for the given models
    DeployTf {
        /// Models to deploy
        #[arg(required = true)]
        models: Vec<String>,

        /// local-docker, local-process or remote
        #[arg(long, value_parser = parse_mode)]
        mode: ResolutionMode,

        /// Models configuration file (TOML or JSON)
        #[arg(long, env = "MODELS_CONFIG")]
        models_config: PathBuf,

        /// Name of the written configuration, without extension
        #[arg(long, default_value = model_assets_service::DEFAULT_CONFIG_NAME)]
        config_name: String,
    },
}

fn parse_mode(value: &str) -> Result<ResolutionMode, String> {
    value.parse().map_err(|e: model_assets_core::AssetsError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = CliConfig::load(&args.config_dir, &args.environment)
        .context("Failed to load configuration")?;
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    telemetry::init_with_config(telemetry::TelemetryConfig::from(&config.logging))?;
    debug!(environment = %args.environment, "Configuration loaded");

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let settings = config.assets.into_settings(&cwd)?;
    let manager = AssetsManager::new(settings).context("Failed to create the assets manager")?;

    match args.command {
        Command::Fetch { spec, download } => {
            let info = manager.fetch_asset(&spec, download).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::List => {
            let assets = manager.list_assets().await?;
            print!("{}", render_listing(manager.prefix(), &assets));
        }
        Command::Resolve { spec, mode } => {
            let resolved = manager.get_local_path(&spec, mode).await?;
            println!("{}", resolved);
        }
        Command::DeployTf {
            models,
            mode,
            models_config,
            config_name,
        } => {
            let configuration = ModelsConfiguration::from_path(&models_config).await?;
            let target =
                deploy_tf_models(&manager, &configuration, &models, mode, &config_name).await?;
            info!(target = %target.display(), "TF Serving configuration written");
            println!("{}", target.display());
        }
    }

    Ok(())
}

/// Render the asset listing, one asset per line
fn render_listing(prefix: &str, assets: &BTreeMap<String, BTreeSet<AssetVersion>>) -> String {
    let width = assets.keys().map(String::len).max().unwrap_or(0);
    let mut out = format!("prefix: {}\n", prefix);
    let mut versions_count = 0;

    for (name, versions) in assets {
        let versions: Vec<String> = versions.iter().rev().map(|v| v.to_string()).collect();
        versions_count += versions.len();
        out.push_str(&format!("{:<width$}  {}\n", name, versions.join(" "), width = width));
    }

    out.push_str(&format!(
        "Found {} assets ({} different versions)\n",
        assets.len(),
        versions_count
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "model-assets",
            "deploy-tf",
            "classifier",
            "ranker",
            "--mode",
            "local-docker",
            "--models-config",
            "models.toml",
        ])
        .unwrap();

        match args.command {
            Command::DeployTf {
                models,
                mode,
                config_name,
                ..
            } => {
                assert_eq!(models, vec!["classifier", "ranker"]);
                assert_eq!(mode, ResolutionMode::LocalDocker);
                assert_eq!(config_name, "config");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_spec_rejected_by_parser() {
        assert!(Args::try_parse_from(["model-assets", "fetch", "m:x"]).is_err());
        assert!(Args::try_parse_from(["model-assets", "resolve", "m", "--mode", "docker"]).is_err());
    }

    #[test]
    fn test_render_listing() {
        let mut assets = BTreeMap::new();
        assets.insert(
            "m".to_string(),
            [AssetVersion::new(1, 0), AssetVersion::new(2, 0)]
                .into_iter()
                .collect::<BTreeSet<_>>(),
        );
        assets.insert(
            "long/name".to_string(),
            [AssetVersion::new(0, 1)].into_iter().collect(),
        );

        assert_eq!(
            render_listing("p", &assets),
            "prefix: p\nlong/name  0.1\nm          2.0 1.0\nFound 2 assets (3 different versions)\n"
        );
    }
}
