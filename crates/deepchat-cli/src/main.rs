use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deepchat_core::ThreadStore;

mod chat;
mod config;
mod render;
mod source;

use config::Config;
use source::SseTokenSource;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: all tracing including SSE payloads
    Trace,
    /// Verbose: requests, stream lifecycle details
    Debug,
    /// Standard: high-level flow
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "deepchat", about = "Streaming chat with reasoning models", version)]
struct Cli {
    /// Path to the config file (default: ~/.config/deepchat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the endpoint base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Override the model name
    #[arg(long)]
    model: Option<String>,

    /// Log verbosity (RUST_LOG takes precedence if set)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.source.base_url = base_url;
    }
    if let Some(model) = cli.model {
        config.source.model = Some(model);
    }

    let mut source = SseTokenSource::new(config.source.base_url.clone());
    if let Some(key) = &config.source.api_key {
        source = source.with_api_key(key.clone());
    }
    if let Some(model) = &config.source.model {
        source = source.with_default_model(model.clone());
    }

    let threads_path = config.threads_path();
    let mut store = ThreadStore::load(&threads_path)
        .with_context(|| format!("failed to open thread store at {}", threads_path.display()))?;

    chat::run_chat(&config, Arc::new(source), &mut store).await
}
