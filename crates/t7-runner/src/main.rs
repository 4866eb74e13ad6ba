//! # t7-runner
//!
//! Main entry point for the order-state reconciliation runtime.
//!
//! Loads a JSON configuration file, assembles one instrument pipeline per
//! configured symbol over a paper exchange session, and manages their
//! lifecycle: stream consumers, interval triggers, and graceful shutdown
//! with a final cancel-and-save pass.
//!
//! # Usage
//!
//! ```bash
//! t7-runner config.json --log-level info
//! ```

mod paper;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use t7_core::persist::{FilePersister, Persister};
use t7_engine::notify::{LogNotifier, Notifier};
use t7_engine::{ExchangeSession, InstrumentPipeline, Registry};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::paper::PaperSession;

/// Component identifier used in persisted-state keys.
const COMPONENT_ID: &str = "t7";

/// Order-State Reconciliation Runner.
#[derive(Parser)]
#[command(name = "t7-runner", about = "Order-State Reconciliation Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration and initialize logging
    let config = t7_core::config::load_config(&cli.config)?;
    let module_name = config.module_name.clone().unwrap_or_else(|| "t7-runner".to_string());
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path.clone());
    t7_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &module_name);

    info!(
        "t7-runner starting — config={}, {} instrument(s)",
        cli.config.display(),
        config.instruments.len(),
    );

    // 2. Shared collaborators: persistence backend and exchange session
    let state_dir = config.state_dir.clone().unwrap_or_else(|| "./state".to_string());
    let persister = Arc::new(
        FilePersister::new(&state_dir)
            .with_context(|| format!("creating state dir {state_dir}"))?,
    );
    let session = Arc::new(PaperSession::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 3. Assemble one pipeline per instrument
    let mut registry = Registry::new();
    let mut tasks = Vec::new();

    for inst in &config.instruments {
        let market = inst.market();
        let symbol = market.symbol.clone();

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        session.attach(&symbol, event_tx);

        let pipeline = Arc::new(InstrumentPipeline::new(
            market,
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&persister) as Arc<dyn Persister>,
            inst.reconcile.clone(),
            COMPONENT_ID,
        ));

        // a persistence failure other than "not found" aborts startup
        pipeline.load_state()?;

        // notification fan-out: trade, realized pnl, position change
        let quote = inst.quote_currency.clone();
        {
            let n = Arc::clone(&notifier);
            pipeline.collector().on_trade(move |trade| {
                n.notify(&trade.to_string());
            });
        }
        {
            let n = Arc::clone(&notifier);
            let symbol = symbol.clone();
            pipeline.collector().on_profit(move |_, profit, net| {
                n.notify(&format!("{symbol} realized {profit} {quote} (net {net})"));
            });
        }
        {
            let n = Arc::clone(&notifier);
            pipeline.collector().on_position_update(move |position| {
                n.notify(&position.to_string());
            });
        }

        registry.insert(Arc::clone(&pipeline));

        // stream consumer: the single writer for this instrument
        tasks.push(tokio::spawn(
            Arc::clone(&pipeline).run(event_rx, shutdown_rx.clone()),
        ));

        // interval trigger: flush deferred trades, cancel and verify
        let interval_secs = inst.effective_interval_secs();
        let mut interval_shutdown = shutdown_rx.clone();
        let interval_pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.tick().await; // skip the immediate first tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        interval_pipeline.on_interval(&mut interval_shutdown).await;
                    }
                    res = interval_shutdown.changed() => {
                        if res.is_err() || *interval_shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        }));

        info!("pipeline for {symbol} started (interval {interval_secs}s)");
    }

    info!("all {} pipeline(s) started — press Ctrl+C to stop", registry.len());

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            warn!("task join error: {e}");
        }
    }

    // 5. Final pass per instrument: drain the book, save the ledger
    for pipeline in registry.iter() {
        // the main shutdown signal has already fired; the final pass gets
        // its own never-fired signal, bounded by a wall-clock timeout
        let (_final_tx, mut final_rx) = watch::channel(false);
        match tokio::time::timeout(Duration::from_secs(30), pipeline.on_interval(&mut final_rx))
            .await
        {
            Ok(outcome) => {
                if !outcome.is_converged() {
                    error!("{} final reconcile did not converge: {outcome:?}", pipeline.symbol());
                }
            }
            Err(_) => {
                error!("{} final reconcile timed out", pipeline.symbol());
            }
        }

        if let Err(e) = pipeline.save_state() {
            error!("{} state save failed: {e:#}", pipeline.symbol());
        }
    }

    info!("all pipelines stopped — goodbye");
    Ok(())
}
