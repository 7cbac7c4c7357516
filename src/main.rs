use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use finch_bot::news::{self, NewsService};
use finch_bot::{Config, Daemon};

/// Finch - Telegram chatbot with market-news insight
#[derive(Parser)]
#[command(name = "finch", version, about)]
struct Cli {
    /// Path to a config file (defaults to ~/.config/finch/config.toml)
    #[arg(short, long, env = "FINCH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate configuration and print a summary
    CheckConfig,
    /// Fetch headlines and sentiment for a topic, then exit
    News {
        /// Topic to search for; omit for business top-headlines
        topic: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,finch_bot=info",
        1 => "info,finch_bot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Some(command) = cli.command {
        return match command {
            Command::CheckConfig => check_config(&config),
            Command::News { topic } => {
                let topic = topic.join(" ");
                fetch_news(&config, (!topic.is_empty()).then_some(topic)).await
            }
        };
    }

    tracing::info!(provider = %config.provider, "starting finch");

    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}

/// Print a configuration summary
fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration OK");
    println!("  provider:       {}", config.provider);
    println!("  model:          {}", config.model);
    println!(
        "  rate limit:     {} requests / {:?}",
        config.rate_limit.max_requests, config.rate_limit.window
    );
    println!("  history:        {} exchanges per user", config.max_exchanges);
    println!(
        "  news:           {}",
        if config.news.api_key.is_some() {
            "enabled"
        } else {
            "disabled (NEWS_API_KEY not set)"
        }
    );
    Ok(())
}

/// One-shot news fetch for the command line
async fn fetch_news(config: &Config, topic: Option<String>) -> anyhow::Result<()> {
    let service = NewsService::new(&config.news)?;
    let articles = service.headlines(topic.as_deref()).await?;

    if articles.is_empty() {
        println!("No headlines found.");
        return Ok(());
    }

    let report = news::sentiment::score(articles.iter().map(|a| a.title.as_str()));
    println!(
        "Mood: {} (score {:+.2}; {} bullish / {} bearish)",
        report.sentiment, report.score, report.bullish_hits, report.bearish_hits
    );
    println!();

    for article in articles.iter() {
        match article.published_at {
            Some(ts) => println!(
                "[{}] {} ({})",
                ts.format("%Y-%m-%d %H:%M"),
                article.title,
                article.source
            ),
            None => println!("{} ({})", article.title, article.source),
        }
        println!("    {}", article.url);
    }

    Ok(())
}
