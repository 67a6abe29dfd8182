mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use panograb::prelude::*;
use panograb::variant::classify;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("panograb=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // no network or database needed
    match &cli.command {
        Commands::Classify { url } => {
            match classify(url) {
                Some(variant) => println!("{variant:?} ({variant})"),
                None => bail!("unknown site: {url}"),
            }
            return Ok(());
        }
        Commands::Plan { manifest } => {
            let text = tokio::fs::read_to_string(manifest)
                .await
                .with_context(|| format!("reading {}", manifest.display()))?;
            let work: WorkDescriptor = serde_json::from_str(&text).context("decoding manifest")?;
            for asset in work.download_plan() {
                println!("{}\t{}", asset.path, asset.url);
            }
            return Ok(());
        }
        _ => {}
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.database_url.is_some() {
        settings.database_url = cli.database_url.clone();
    }
    let app = Panograb::connect(settings).await?;

    match cli.command {
        Commands::Resolve { url, output } => {
            let Some(work) = app.resolve_work_json(&url).await else {
                bail!("could not resolve a work from {url}");
            };
            let json = serde_json::to_string_pretty(&work)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("{} panoramas written to {}", work.panorama.count, path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Title { url } => println!("{}", app.page_title(&url).await),
        Commands::History { remove } => {
            let history = match remove {
                Some(file) => app.remove_history(&file).await,
                None => app.history().await,
            };
            for entry in history.0 {
                println!("{} {}\t{}", entry.date, entry.time, entry.file);
            }
        }
        Commands::Dir { path } => {
            if let Some(path) = path {
                app.set_download_dir(&path).await;
            }
            match app.download_dir().await {
                Some(dir) => println!("{dir}"),
                None => println!("(not set)"),
            }
        }
        Commands::Classify { .. } | Commands::Plan { .. } => {}
    }
    Ok(())
}
