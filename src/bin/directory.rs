//! Directory service binary: binds a UDP endpoint, serves the three
//! directory-bound actions, and periodically logs the connected-peer count.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use udpmesh::{Directory, DirectoryOptions};

#[derive(serde::Deserialize)]
struct Config {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
    #[serde(default = "default_logging")]
    logging: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:60001".to_string()
}

fn default_logging() -> bool {
    true
}

impl Config {
    /// Loads `directory.toml` from the current working directory. Generates
    /// a default file and asks the operator to rerun on first launch rather
    /// than silently assuming defaults.
    fn load() -> Result<Self> {
        let path = std::env::current_dir()?.join("directory.toml");
        if !path.exists() {
            let template = "# udpmesh directory configuration\nbind_addr = \"0.0.0.0:60001\"\nlogging = true\n";
            std::fs::write(&path, template).context("failed to write default directory.toml")?;
            return Err(anyhow::anyhow!(
                "default config created at {:?}; edit it and rerun",
                path
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }
}

fn setup_logger() {
    #[cfg(feature = "directory-logging")]
    {
        use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
        let _ = TermLogger::init(
            LevelFilter::Info,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();

    // A positional CLI argument overrides the config file's bind_addr; no
    // arg-parsing crate is introduced for a single optional override.
    let override_addr = std::env::args().nth(1);
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) if override_addr.is_some() => {
            log::warn!("directory.toml unavailable ({e}), using CLI override only");
            Config {
                bind_addr: override_addr.clone().unwrap(),
                logging: true,
            }
        }
        Err(e) => return Err(e),
    };
    let bind_addr = override_addr.unwrap_or(config.bind_addr);

    let directory = Directory::bind(
        &bind_addr,
        DirectoryOptions {
            logging: config.logging,
        },
    )
    .await
    .context("failed to bind directory socket")?;

    log::info!("directory listening on {bind_addr}");

    let cancel = CancellationToken::new();
    let directory = std::sync::Arc::new(directory);

    let serve_directory = std::sync::Arc::clone(&directory);
    let serve_cancel = cancel.clone();
    let serve_task = tokio::spawn(async move { serve_directory.serve(serve_cancel).await });

    let watcher_directory = std::sync::Arc::clone(&directory);
    let watcher_cancel = cancel.clone();
    let watcher_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = watcher_cancel.cancelled() => break,
                _ = tick.tick() => {
                    log::info!("{} peer(s) connected", watcher_directory.connected_peers().len());
                }
            }
        }
    });

    tokio::signal::ctrl_c().await.ok();
    log::info!("shutting down");
    cancel.cancel();
    let _ = serve_task.await;
    let _ = watcher_task.await;

    Ok(())
}
