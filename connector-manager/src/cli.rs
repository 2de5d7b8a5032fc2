//! Command-line interface for the `tasksync` binary.

use crate::collector::{collect, JsonLinesSink};
use crate::registry::{validate_target, ServiceContext, ServiceKind};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tasksync::config::{load_config, resolve_config_path, Config};
use tasksync::credentials::{CredentialResolver, EnvSecretStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(about = "Pull issues from Gerrit, Phabricator, Redmine and Pivotal Tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: $TASKSYNC_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Pull every target and print one JSON record per line
    Pull,

    /// Print Taskwarrior UDA definitions for the configured targets
    Uda,

    /// Validate the config file and list its targets
    Validate,
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the config level.
pub fn init_tracing(log_level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { log_level };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the parsed command. `Ok(false)` means some target failed.
pub async fn run(cli: Cli) -> Result<bool> {
    let config = resolve_config_path(cli.config.as_deref()).and_then(|path| load_config(&path));
    let log_level = match &config {
        Ok(config) => config.general.log_level.as_str(),
        Err(_) => "info",
    };
    init_tracing(log_level, cli.verbose);
    let config = config?;

    match cli.command {
        Commands::Pull => {
            let ctx = ServiceContext {
                general: config.general.clone(),
                credentials: CredentialResolver::new(
                    Arc::new(EnvSecretStore::new()),
                    config.general.interactive,
                ),
            };
            let mut sink = JsonLinesSink::new(std::io::stdout());
            let report = collect(&config, &ctx, &mut sink).await;
            info!(
                records = report.records,
                failed = report.failed_targets.len(),
                "Pull finished"
            );
            Ok(report.is_success())
        }
        Commands::Uda => {
            for line in uda_lines(&config)? {
                println!("{}", line);
            }
            Ok(true)
        }
        Commands::Validate => Ok(validate(&config)),
    }
}

/// `.taskrc` lines for each distinct service kind, in target order.
pub fn uda_lines(config: &Config) -> Result<Vec<String>> {
    let mut kinds: Vec<ServiceKind> = Vec::new();
    for section in config.targets()? {
        let kind = validate_target(&section)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds
        .iter()
        .flat_map(|kind| kind.udas())
        .flat_map(|uda| uda.taskrc_lines())
        .collect())
}

fn validate(config: &Config) -> bool {
    let mut ok = true;
    for name in &config.general.targets {
        match config
            .target(name)
            .and_then(|section| validate_target(&section))
        {
            Ok(kind) => println!("{} ({})", name, kind.name()),
            Err(e) => {
                error!("{}", e);
                ok = false;
            }
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pull_with_global_flags() {
        let cli = Cli::try_parse_from(["tasksync", "pull", "--config", "/tmp/t.toml", "-v"]).unwrap();
        assert_eq!(cli.command, Commands::Pull);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_requires_subcommand() {
        assert!(Cli::try_parse_from(["tasksync"]).is_err());
        assert!(Cli::try_parse_from(["tasksync", "sync"]).is_err());
    }

    #[test]
    fn test_uda_lines_once_per_kind() {
        let config = Config::from_toml_str(
            r#"
            [general]
            targets = ["a", "b", "c"]

            [a]
            service = "redmine"
            url = "https://rm.example.com"
            key = "k"

            [b]
            service = "redmine"
            url = "https://rm2.example.com"
            key = "k"

            [c]
            service = "gerrit"
            base_uri = "https://review.example.com"
            username = "alice"
            "#,
        )
        .unwrap();

        let lines = uda_lines(&config).unwrap();
        let redmine = ServiceKind::Redmine.udas().len();
        let gerrit = ServiceKind::Gerrit.udas().len();
        assert_eq!(lines.len(), 2 * (redmine + gerrit));
        assert_eq!(lines[0], "uda.redmineurl.type=string");
        assert_eq!(lines[1], "uda.redmineurl.label=Redmine URL");
        assert!(lines.iter().any(|l| l == "uda.gerritid.type=numeric"));
    }

    #[test]
    fn test_validate_reports_bad_target() {
        let config = Config::from_toml_str(
            r#"
            [general]
            targets = ["good", "bad"]

            [good]
            service = "phabricator"

            [bad]
            service = "trac"
            "#,
        )
        .unwrap();
        assert!(!validate(&config));
    }
}
