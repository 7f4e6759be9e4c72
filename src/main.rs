use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use listing_crawler::config::{self, AppConfig, FetchMode};
use listing_crawler::crawler::{CrawlReport, CrawlSupervisor};
use listing_crawler::llm::create_client;
use listing_crawler::scrapers::{AdapterRegistry, BrowserFetcher, Fetcher, HttpFetcher};
use listing_crawler::store::{JsonFileStore, PersistenceSink};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-crawler", about = "Crawl and enrich real-estate listings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every enabled source (default)
    Crawl,
    /// Crawl a single source
    Test {
        #[arg(long)]
        source: String,
    },
    /// List configured sources
    List,
    /// Show stored listing counts and recent sessions
    Stats {
        /// Number of recent sessions to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::log_level())),
        )
        .init();

    if let Err(e) = dotenv {
        warn!(error = %e, "Ignoring unreadable .env file");
    }
    let config = Arc::new(AppConfig::from_env().context("Failed to load configuration")?);

    match cli.command.unwrap_or(Commands::Crawl) {
        Commands::List => {
            list_sources(&config);
            Ok(())
        }
        Commands::Stats { limit } => {
            let store = JsonFileStore::open(&config.data_dir).await?;
            print_stats(&store, limit).await
        }
        Commands::Crawl => {
            info!("🏠 Listing crawler: crawling all enabled sources");
            let supervisor = build_supervisor(config).await?;
            print_report(&supervisor.run().await);
            Ok(())
        }
        Commands::Test { source } => {
            info!(source = %source, "🏠 Listing crawler: test crawl");
            let supervisor = build_supervisor(config).await?;
            print_report(&supervisor.run_sources(&[source]).await);
            Ok(())
        }
    }
}

async fn build_supervisor(config: Arc<AppConfig>) -> Result<CrawlSupervisor> {
    let fetcher: Arc<dyn Fetcher> = match config.fetch_mode {
        FetchMode::Http => Arc::new(HttpFetcher::new()?),
        FetchMode::Browser => Arc::new(BrowserFetcher::new(Duration::from_secs(3))?),
    };
    let store: Arc<dyn PersistenceSink> = Arc::new(
        JsonFileStore::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open store in {}", config.data_dir))?,
    );
    let inference = create_client(&config.llm).context("Failed to create LLM client")?;
    let registry = AdapterRegistry::with_builtin(&config.sources);

    Ok(CrawlSupervisor::new(config, registry, fetcher, store, inference))
}

fn list_sources(config: &AppConfig) {
    for source in &config.sources {
        let state = if source.enabled { "enabled" } else { "disabled" };
        println!("{} ({state})", source.name);
        for url in &source.search_urls {
            println!("   {url}");
        }
    }
}

async fn print_stats(store: &dyn PersistenceSink, limit: usize) -> Result<()> {
    let counts = store.count_by_source().await?;
    println!("Stored listings:");
    for (source, count) in &counts {
        println!("   {source}: {count}");
    }
    println!("   total: {}", counts.values().sum::<usize>());

    println!("\nRecent sessions:");
    for session in store.recent_sessions(limit).await? {
        println!(
            "   {} {} [{}] {} ok, {} duplicate, {} failed",
            session.start_time.format("%Y-%m-%d %H:%M"),
            session.source,
            session.status,
            session.successful_items,
            session.duplicate_items,
            session.failed_items
        );
    }
    Ok(())
}

fn print_report(report: &CrawlReport) {
    println!("\n✅ Crawl finished at {}\n", report.finished_at.format("%Y-%m-%d %H:%M:%S"));
    for source in &report.sources {
        println!("{} [{}]", source.source, source.status);
        println!(
            "   pages: {}, links: {}, ok: {}, duplicate: {}, failed: {}",
            source.total_pages,
            source.total_items,
            source.successful_items,
            source.duplicate_items,
            source.failed_items
        );
        if let Some(error) = &source.error {
            println!("   error: {error}");
        }
    }
    println!("\nTotal extracted: {}", report.total_extracted);
}
