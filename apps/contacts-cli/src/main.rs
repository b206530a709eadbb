use anyhow::Context;
use clap::Parser;
use datastore::DataContextFactory;
use domain::{InMemoryDataContextFactory, InMemoryDataList};
use sqlite_adapter::SqliteDataContextFactory;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod config;
mod models;

use config::{Config, LogFormat, StorageProvider};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let mut cfg = Config::from_env()?;
    if let Some(storage) = cli.storage {
        cfg.storage_provider = storage;
    }
    if let Some(path) = cli.db_path.clone() {
        cfg.db_path = Some(path);
    }

    init_tracing(cfg.log_format);
    cfg.warn_if_ephemeral();

    let factory = build_factory(&cfg)?;
    let mut stdout = std::io::stdout().lock();
    commands::run_command(cli.command, factory.as_ref(), &mut stdout)
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(fmt::time::SystemTime)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

fn build_factory(cfg: &Config) -> anyhow::Result<Box<dyn DataContextFactory>> {
    let factory: Box<dyn DataContextFactory> = match cfg.storage_provider {
        StorageProvider::Memory => Box::new(InMemoryDataContextFactory::new(
            InMemoryDataList::default(),
        )),
        StorageProvider::Sqlite => match &cfg.db_path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("creating {}", dir.display()))?;
                }
                Box::new(SqliteDataContextFactory::new(path)?)
            }
            None => Box::new(SqliteDataContextFactory::from_env()?),
        },
    };
    tracing::debug!(provider = ?cfg.storage_provider, "storage initialized");
    Ok(factory)
}
