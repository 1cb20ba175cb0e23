//! Publication watcher binary.
//!
//! ```text
//! sbs-watch [--config PATH | PATH] [--once] [--dry-run]
//! ```
//!
//! Without `--once` the process runs the scheduler and status server until
//! Ctrl-C. `--once` runs a single cycle and prints its result as JSON.
//! `--dry-run` works on an in-memory copy of the store and sends nothing.

use clap::Parser;
use sbs_watch::WatchConfig;
use sbs_watch::startup::{build_dry_run_cycle, build_live_cycle, preflight, run_service};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Watches the statistics portal for newly published monthly files.
#[derive(Parser, Debug)]
#[command(name = "sbs-watch", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, conflicts_with = "config_file")]
    config: Option<PathBuf>,

    /// Path to TOML configuration file (positional form of `--config`).
    #[arg(value_name = "CONFIG")]
    config_file: Option<PathBuf>,

    /// Run a single cycle, print its result as JSON and exit.
    #[arg(long)]
    once: bool,

    /// Work on an in-memory copy of the store and send no notifications.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn config_path(&self) -> Option<&Path> {
        self.config.as_deref().or(self.config_file.as_deref())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = WatchConfig::load(args.config_path())?;
    let _log_guard = sbs_watch::logging::init(&config.logging)?;
    tracing::info!("sbs-watch {} starting", env!("CARGO_PKG_VERSION"));

    preflight(&config)?;

    let cycle = if args.dry_run {
        build_dry_run_cycle(&config).await?
    } else {
        build_live_cycle(&config)?
    };

    if args.once {
        let result = cycle.run_once().await.map_err(|e| {
            tracing::error!(error = %e, "cycle failed");
            anyhow::anyhow!("cycle failed: {e}")
        })?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for Ctrl-C: {e}");
                return;
            }
            tracing::info!("Ctrl-C received");
            cancel.cancel();
        }
    });

    run_service(&config, cycle, cancel).await.map_err(|e| {
        tracing::error!(error = %e, "sbs-watch exited with error");
        anyhow::anyhow!("sbs-watch failed: {e}")
    })?;

    tracing::info!("sbs-watch shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sbs-watch").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_config_and_flags() {
        let cli = parse(&["watch.toml", "--once", "--dry-run"]).unwrap();
        assert_eq!(cli.config_path(), Some(Path::new("watch.toml")));
        assert!(cli.once);
        assert!(cli.dry_run);
    }

    #[test]
    fn config_flag_requires_value() {
        assert!(parse(&["--config"]).is_err());
        let cli = parse(&["-c", "a.toml"]).unwrap();
        assert_eq!(cli.config_path(), Some(Path::new("a.toml")));
    }

    #[test]
    fn no_config_falls_back_to_lookup() {
        let cli = parse(&[]).unwrap();
        assert!(cli.config_path().is_none());
        assert!(!cli.once);
    }

    #[test]
    fn rejects_unknown_extra_and_conflicting_arguments() {
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["a.toml", "b.toml"]).is_err());
        assert!(parse(&["--config", "a.toml", "b.toml"]).is_err());
    }

    #[test]
    fn help_and_version_are_handled_by_clap() {
        let help = parse(&["--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        let version = parse(&["--version"]).unwrap_err();
        assert_eq!(version.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
