use clap::Parser;
use gmaps_core::ScrapeRequest;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gmaps-cli")]
#[command(about = "Scrape Google Maps places and reviews for a search query")]
struct Cli {
    /// Free-text search, e.g. "coffee shops in Lisbon".
    query: String,

    /// Stop after discovering this many places.
    #[arg(long)]
    max_places: Option<usize>,

    /// Interface language for the search page.
    #[arg(long, default_value = "en")]
    lang: String,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    /// Skip review pagination.
    #[arg(long)]
    no_reviews: bool,
}

impl Cli {
    fn into_request(self) -> ScrapeRequest {
        ScrapeRequest {
            query: self.query,
            max_places: self.max_places,
            lang: self.lang,
            headless: !self.headful,
            extract_reviews: !self.no_reviews,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = gmaps_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let request = Cli::parse().into_request();
    tracing::debug!(?request, "starting scrape");

    let places = gmaps_scraper::scrape(&request, &config).await?;
    println!("{}", serde_json::to_string_pretty(&places)?);

    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
