//! Block Canvas command-line browser

use std::time::Duration;

use blockcanvas_cli::{
    Cli, Commands, browse, format_visit, history, load_config, open_store, run_maintenance,
};
use blockcanvas_core::CollectionKey;
use blockcanvas_fetch::HttpCollectionApi;
use blockcanvas_logging::{CanvasSubscriberBuilder, ConsoleConfig, LogConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig {
            console: ConsoleConfig {
                pretty: true,
                level: Some("warn".to_string()),
                ..ConsoleConfig::default()
            },
            ..LogConfig::default()
        }
    };
    let logging = CanvasSubscriberBuilder::new()
        .with_config(log_config)
        .init()?;

    let config = load_config(cli.config.as_deref())?;
    let store = open_store(&config)?;
    let removed = run_maintenance(store.as_ref(), config.cache.max_age()).await?;

    match cli.command {
        Commands::Browse {
            key,
            refresh,
            settle_secs,
        } => {
            let key = CollectionKey::new(key.as_deref().unwrap_or(&config.default_collection))?;
            let api = HttpCollectionApi::new(&config.api)?;
            let report = browse(
                config,
                store,
                api,
                &key,
                refresh,
                Duration::from_secs(settle_secs),
            )
            .await?;
            for line in report.lines() {
                println!("{}", line);
            }
        }
        Commands::History { limit, collection } => {
            let collection = collection.map(CollectionKey::new).transpose()?;
            let visits = history(store.as_ref(), limit, collection.as_ref()).await?;
            if visits.is_empty() {
                println!("No visits recorded");
            }
            for visit in &visits {
                println!("{}", format_visit(visit));
            }
        }
        Commands::Evict => {
            println!("Removed {} expired records", removed);
        }
    }

    if let Some(panel) = logging.panel() {
        for entry in panel.entries() {
            println!("{}", entry);
        }
    }

    Ok(())
}
