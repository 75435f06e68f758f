// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # credpipe
//!
//! Entry point for the `credpipe` binary. Parses CLI arguments, sets up
//! logging, and runs the wallet against an in-memory devnet.
//!
//! - `demo`         — faucet, pipe transfer, issuance, spend, double spend,
//!   re-randomization and redeem, end to end
//! - `check-config` — load and validate a configuration file
//! - `version`      — print build version information

mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use credpipe_wallet::config::{ClientConfig, TimingConfig};
use credpipe_wallet::devnet::{Devnet, DevnetConfig};
use credpipe_wallet::notify::{EventBus, Severity, UiSignal, WalletEvent};
use credpipe_wallet::{Session, WalletResult};

use cli::{CheckConfigArgs, Commands, CredpipeCli, DemoArgs};
use metrics::ClientMetrics;

/// Broadcast capacity for wallet events. The demo's bursts are far below it.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CredpipeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::CheckConfig(args) => check_config(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs every workflow once, in the order a user would.
async fn run_demo(args: DemoArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ClientConfig::load_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => demo_config(),
    };
    let provider = match &args.provider {
        Some(id) => id.clone(),
        None => config
            .service_providers
            .keys()
            .next()
            .cloned()
            .context("configuration lists no service providers")?,
    };

    let devnet = Devnet::new(DevnetConfig {
        initial_erc20: args.initial_erc20,
        settle_delay_ms: args.settle_delay_ms,
        ..DevnetConfig::default()
    });
    let metrics = ClientMetrics::new().context("failed to register metrics")?;
    let bus = EventBus::new(EVENT_CHANNEL_CAPACITY);
    let listener = spawn_event_listener(bus.subscribe(), metrics.clone(), args.events_json);

    let session = Session::new(config, devnet.collaborators(), Arc::new(bus))
        .context("invalid client configuration")?;
    tracing::info!(
        identifier = %session.config().identifier,
        ethereum_node = %session.config().primary_ethereum_node(),
        provider = %provider,
        "starting demo"
    );

    if !session.bootstrap().await {
        finish(session.spawn_register_account()).await?;
    }

    let faucet = finish(session.spawn_faucet()).await?;
    if !faucet.succeeded() {
        bail!("faucet did not deliver funds");
    }

    let moved = finish(session.spawn_transfer_to_pipe(args.transfer.clone())).await?;
    tracing::info!(
        erc20 = moved.erc20_balance,
        native = moved.native_balance,
        "pipe transfer settled"
    );

    let record = finish(session.spawn_issue(args.value.clone())).await?;
    let sequence = record.sequence_id();

    let accepted = finish(session.spawn_spend(provider.clone(), sequence.clone())).await?;
    if !accepted {
        metrics.spend_rejections_total.inc();
    }
    // Present the same credential again; the verifier should refuse it.
    let replayed = finish(session.spawn_spend(provider, sequence.clone())).await?;
    if !replayed {
        metrics.spend_rejections_total.inc();
    }

    let rerandomized = session.rerandomize(&sequence)?;
    tracing::info!(sequence = %sequence, credential = %rerandomized, "credential re-randomized");

    finish(session.spawn_redeem(args.redeem.clone())).await?;
    finish(session.spawn_refresh()).await?;

    session.cancel_all();
    // The bus closes once the last session handle is gone.
    drop(session);
    listener.await.context("event listener panicked")?;

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    tracing::info!("demo finished");
    Ok(())
}

/// Awaits a background workflow. The error was already shown to the user by
/// the session; here it only stops the demo.
async fn finish<T>(handle: JoinHandle<WalletResult<T>>) -> Result<T> {
    let outcome = handle.await.context("workflow task panicked")?;
    Ok(outcome?)
}

/// Logs every wallet event and feeds the metrics. With `as_json`, events
/// also go to stdout one JSON object per line, for UI adapters.
fn spawn_event_listener(
    mut rx: broadcast::Receiver<WalletEvent>,
    metrics: ClientMetrics,
    as_json: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    metrics.observe(&event);
                    log_event(&event);
                    if as_json {
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{}", line),
                            Err(e) => tracing::warn!(error = %e, "could not encode event"),
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &WalletEvent) {
    match event {
        WalletEvent::Notification { severity, message } => match severity {
            Severity::Error => tracing::error!(title = severity.title(), "{}", message),
            Severity::Warning => tracing::warn!(title = severity.title(), "{}", message),
            Severity::Info => tracing::info!(title = severity.title(), "{}", message),
        },
        WalletEvent::Signal(UiSignal::Balance {
            ledger,
            kind,
            amount,
        }) => tracing::debug!(%ledger, ?kind, amount, "balance"),
        WalletEvent::Signal(UiSignal::NewCredential(item)) => {
            tracing::info!(sequence = %item.sequence, value = item.value, "new credential")
        }
        WalletEvent::Signal(UiSignal::Secret(_)) => tracing::info!("account secret generated"),
        WalletEvent::Signal(UiSignal::Endpoints {
            ethereum_node,
            issuing_authorities,
            blockchain_nodes,
            ..
        }) => tracing::info!(
            %ethereum_node,
            issuing_authorities = issuing_authorities.len(),
            blockchain_nodes = blockchain_nodes.len(),
            "endpoints configured"
        ),
        WalletEvent::Signal(signal) => tracing::debug!(?signal, "ui signal"),
    }
}

/// A configuration pointing at nothing but the devnet, with short timings.
fn demo_config() -> ClientConfig {
    let mut config = ClientConfig::new("credpipe-demo");
    config
        .service_providers
        .insert("sp-alpha".to_string(), "0x7a8b9c0d1e2f3a4b".to_string());
    config
        .service_providers
        .insert("sp-beta".to_string(), "0x0d1e2f7a8b9c4b3a".to_string());
    config.timing = TimingConfig {
        poll_interval_ms: 500,
        finality_timeout_ms: 30_000,
        ..TimingConfig::default()
    };
    config
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = ClientConfig::load_file(&args.path)
        .with_context(|| format!("invalid configuration {}", args.path.display()))?;

    println!("identifier:          {}", config.identifier);
    println!("account keys file:   {}", config.account_keys_file.display());
    println!("ethereum node:       {}", config.primary_ethereum_node());
    println!("erc20 contract:      {}", config.erc20_contract);
    println!("pipe account:        {}", config.pipe_account);
    println!("issuing authorities: {}", config.issuing_authorities.len());
    println!("blockchain nodes:    {}", config.blockchain_nodes.len());
    println!("spend policy:        {:?}", config.spend_policy);
    println!(
        "timing:              poll {}ms, timeout {}ms, faucet {}",
        config.timing.poll_interval_ms,
        config.timing.finality_timeout_ms,
        config.timing.faucet_amount
    );
    println!("service providers:");
    for (id, address) in &config.service_providers {
        println!("  {:<16} {}", id, address);
    }
    Ok(())
}

fn print_version() {
    println!("credpipe {}", env!("CARGO_PKG_VERSION"));
    println!("  rustc:   {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
    println!("  target:  {}", std::env::consts::ARCH);
    println!("  os:      {}", std::env::consts::OS);
}
