//! CLI for the ordersink write engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ordersink_core::config::{self, AppConfig};
use std::path::PathBuf;

use commands::{run_config, run_insert, run_load, run_serve};

/// Top-level CLI for ordersink.
#[derive(Debug, Parser)]
#[command(name = "ordersink")]
#[command(about = "ordersink: order writes against a throughput-limited store, with retry/backoff", long_about = None)]
pub struct Cli {
    /// Load configuration from this file instead of ~/.config/ordersink/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable the retry policy: every write gets exactly one attempt.
    #[arg(long, global = true)]
    pub no_retry: bool,

    /// Override retry.max_retries (retries beyond the first attempt).
    #[arg(long, global = true, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Log to stderr instead of ~/.local/state/ordersink/ordersink.log.
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Serve the /orders endpoint against the simulated partitioned store.
    Serve {
        /// Bind address (default: listen_addr from config).
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Insert one order and print the outcome.
    Insert {
        /// Treat the write as unsafe to resend after a timeout.
        #[arg(long)]
        non_idempotent: bool,
    },

    /// Fire many concurrent inserts and print a throttling/retry summary.
    Load {
        /// Total number of orders to write.
        #[arg(long, default_value = "100", value_name = "N")]
        count: usize,
        /// Maximum writes in flight at once.
        #[arg(long, default_value = "16", value_name = "C")]
        concurrency: usize,
        /// Treat the writes as unsafe to resend after a timeout.
        #[arg(long)]
        non_idempotent: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// Config file (or defaults), then environment, then command-line flags.
    pub fn effective_config(&self) -> Result<AppConfig> {
        let mut cfg = config::load(self.config.as_deref())?;
        self.apply_overrides(&mut cfg);
        Ok(cfg)
    }

    fn apply_overrides(&self, cfg: &mut AppConfig) {
        if self.no_retry {
            cfg.retry.enabled = false;
        }
        if let Some(n) = self.max_retries {
            cfg.retry.max_retries = n;
        }
    }

    pub async fn run(self) -> Result<()> {
        let cfg = self.effective_config()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Serve { listen } => run_serve(&cfg, listen.as_deref()).await?,
            CliCommand::Insert { non_idempotent } => run_insert(&cfg, non_idempotent).await?,
            CliCommand::Load {
                count,
                concurrency,
                non_idempotent,
            } => run_load(&cfg, count, concurrency, non_idempotent).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
