use anyhow::Result;
use clap::{CommandFactory, Parser};
use mdspeak::app::{run_parse_command, run_speak_command};
use mdspeak::cli::{Cli, Commands, ConfigAction};
use mdspeak::config::Config;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mdspeak::logging::init(cli.verbose, cli.quiet);
    tracing::debug!(version = %mdspeak::version_string(), "starting");

    match cli.command {
        Commands::Parse {
            file,
            max_chunk_chars,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_parse_command(config, &file, max_chunk_chars)?;
        }
        Commands::Speak(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_speak_command(config, args, cli.quiet, cli.verbose).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mdspeak", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from the custom path, or from the default location
/// with defaults when no file exists. Environment overrides apply last.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

fn config_path(custom_path: Option<&Path>) -> Result<PathBuf> {
    custom_path
        .map(Path::to_path_buf)
        .or_else(Config::default_path)
        .ok_or_else(|| anyhow::anyhow!("Could not determine a configuration directory"))
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path(custom_path)?.display());
        }
        ConfigAction::Init { force } => {
            let path = config_path(custom_path)?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::default().to_toml()?)?;
            println!("{}", format!("Wrote {}", path.display()).green());
        }
    }
    Ok(())
}
