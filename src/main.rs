use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod timeline;

use app::{App, FeedOutput, RunOptions, RunOutcome};
use config::Config;
use error::{AppError, Result};

const USAGE: &str = "usage: timeline-rss [--config <path>] [--print] [--no-fetch]";

struct Args {
    config_path: Option<PathBuf>,
    print: bool,
    fetch: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args {
        config_path: None,
        print: false,
        fetch: true,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config(format!("--config needs a path\n{}", USAGE)))?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--print" => parsed.print = true,
            "--no-fetch" => parsed.fetch = false,
            other => {
                return Err(AppError::Config(format!(
                    "unknown argument {}\n{}",
                    other, USAGE
                )))
            }
        }
    }
    Ok(parsed)
}

/// Logs go to stderr, and also to `log_path` when one is configured.
fn init_logging(config: &Config) -> Result<()> {
    let file_layer = match &config.log_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    let config = Config::load(args.config_path.as_deref())?;
    init_logging(&config)?;

    let options = RunOptions {
        fetch: args.fetch,
        output: if args.print {
            FeedOutput::Stdout
        } else {
            FeedOutput::File(PathBuf::from(&config.feed_path))
        },
    };

    let app = App::from_config(&config)?;
    match app.run(&options).await {
        Ok(RunOutcome::Rendered { items, .. }) => {
            tracing::info!("Finished generating feed with {} items", items);
            Ok(())
        }
        Ok(RunOutcome::Skipped) => {
            tracing::info!("Feed left unchanged");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run aborted: {}", e);
            Err(e)
        }
    }
}
