//! # CLI Interface
//!
//! `credpipe` subcommands: `demo`, `check-config` and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Credential wallet driver.
///
/// Runs the wallet workflows (faucet, pipe transfer, issuance, spend,
/// redeem) against an in-memory devnet and reports what happened.
#[derive(Parser, Debug)]
#[command(
    name = "credpipe",
    about = "Credential wallet driver",
    version,
    propagate_version = true
)]
pub struct CredpipeCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter, overridden by `RUST_LOG`.
    #[arg(
        long,
        global = true,
        default_value = "credpipe=info,credpipe_wallet=info"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full credential lifecycle against a devnet.
    Demo(DemoArgs),
    /// Load and validate a client configuration file.
    CheckConfig(CheckConfigArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Client configuration (TOML). A built-in devnet configuration is
    /// used when omitted.
    #[arg(long, short = 'c', env = "CREDPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// ERC20 balance the devnet account starts with.
    #[arg(long, default_value_t = 1_000)]
    pub initial_erc20: u64,

    /// Amount moved to the pipe account before issuing.
    #[arg(long, default_value = "100")]
    pub transfer: String,

    /// Credential value to request, with or without the `Nym` suffix.
    #[arg(long, default_value = "10Nym")]
    pub value: String,

    /// Service provider to spend at. Defaults to the first configured one.
    #[arg(long)]
    pub provider: Option<String>,

    /// Amount redeemed back to the ERC20 side at the end.
    #[arg(long, default_value = "20")]
    pub redeem: String,

    /// Devnet settlement delay per hop, in milliseconds.
    #[arg(long, default_value_t = 1_500)]
    pub settle_delay_ms: u64,

    /// Write every wallet event to stdout as a JSON line.
    #[arg(long)]
    pub events_json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to the configuration file. A `file://` prefix is accepted.
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CredpipeCli::command().debug_assert();
    }

    #[test]
    fn demo_defaults() {
        let cli = CredpipeCli::parse_from(["credpipe", "demo"]);
        let Commands::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.value, "10Nym");
        assert!(args.config.is_none());
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            CredpipeCli::parse_from(["credpipe", "check-config", "a.toml", "--log-format", "json"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::CheckConfig(_)));
    }
}
