use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ConfigError, MonitorConfig};
use crate::engine::CategoryFilter;

#[derive(Debug, Parser)]
#[command(name = "clawmon")]
#[command(about = "Terminal monitor for an openclaw agent: live logs, session replay, health", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Monitor backend base URL
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Password for backends with login enabled
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[arg(long, global = true)]
    pub reconnect_delay_ms: Option<u64>,

    /// Read settings from this file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    pub no_color: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Follow the global log tail
    Live {
        #[arg(long, default_value = "all")]
        filter: CategoryFilter,

        #[arg(long)]
        search: Option<String>,
    },

    /// Replay one conversation, then follow it
    Session { session_id: String },

    /// Show the system snapshot, refreshed every 30 seconds
    System,

    /// List sessions, processing first
    Sessions,

    /// Check gateway availability once
    Health,

    /// Print the backend version
    Version,
}

impl Cli {
    /// Load configuration and apply command-line overrides on top.
    pub fn config(&self) -> Result<MonitorConfig, ConfigError> {
        let mut config = MonitorConfig::load(self.env_file.as_deref())?;
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = delay;
        }
        config.validate()?;
        Ok(config)
    }
}
