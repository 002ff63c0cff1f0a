//! TIMBA: match betting, team history and player ratings for a Quake Live server
//!
//! Entry point. Loads configuration, initialises structured logging,
//! registers the enabled plugins and feeds them the JSON event lines read
//! from stdin until input ends or Ctrl+C.

use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use timba::betting::window::WindowTimer;
use timba::betting::Timba;
use timba::config::AppConfig;
use timba::history::Funes;
use timba::host::console::FeedLine;
use timba::host::ConsoleHost;
use timba::plugin::{Dispatcher, Plugin};
use timba::rating::Oloraculo;
use timba::types::GameEvent;

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = PathBuf::from(
        std::env::var("TIMBA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string()),
    );
    let cfg = if config_path.exists() {
        AppConfig::load(&config_path)?
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
        AppConfig::default()
    };

    // -- Plugins ---------------------------------------------------------

    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<GameEvent>();

    let mut plugins: Vec<Box<dyn Plugin>> = Vec::new();
    if cfg.timba.enabled {
        plugins.push(Box::new(Timba::new(
            cfg.timba.settings(),
            WindowTimer::new(timer_tx.clone()),
        )));
    }
    if cfg.funes.enabled {
        plugins.push(Box::new(Funes::new(cfg.funes.history_path.clone())));
    }
    if cfg.oloraculo.enabled {
        plugins.push(Box::new(Oloraculo::new(cfg.oloraculo.settings())));
    }
    let mut dispatcher = Dispatcher::new(plugins)?;
    let host = ConsoleHost::new(cfg.host.color_output);

    info!(
        plugins = ?dispatcher.plugin_names(),
        config = %config_path.display(),
        "TIMBA starting up"
    );

    // -- Main loop -------------------------------------------------------

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("End of event feed.");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read event feed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match FeedLine::parse(&line) {
                    Ok(FeedLine::Directive(directive)) => host.apply(directive),
                    Ok(FeedLine::Event(event)) => {
                        dispatcher.dispatch(&event, &host);
                    }
                    Err(e) => warn!(error = %e, "Skipping feed line"),
                }
            }
            Some(event) = timer_rx.recv() => {
                dispatcher.dispatch(&event, &host);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("TIMBA shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber. Logs go to stderr; stdout carries
/// game text only.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("timba=info"));

    let json_logging = std::env::var("TIMBA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
