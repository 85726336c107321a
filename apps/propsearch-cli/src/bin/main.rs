use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use propsearch_core::config::{expand_path, Config, Settings};
use propsearch_core::traits::{ListingIndex, ListingStore, LocationSuggester};
use propsearch_core::types::{Listing, SearchRequest, SortOrder};
use propsearch_core::SearchFilters;
use propsearch_embed::{get_default_provider, EmbeddingClient};
use propsearch_hybrid::HybridSearchEngine;
use propsearch_index::{load_listings, MemoryIndex, OpenSearchClient};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EMBED_CONCURRENCY: usize = 4;

/// Hybrid lexical + semantic property listing search.
#[derive(Parser)]
#[command(name = "propsearch", version, about)]
struct Cli {
    /// Path to a TOML configuration file (default: config.toml + config.<RUST_ENV>.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Serve from a JSON array of listings instead of the document store
    #[arg(long, global = true)]
    listings: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a search and print the response as JSON
    Search(SearchArgs),
    /// Print one listing by id
    Get { id: String },
    /// Suggest city and neighborhood names containing the given text
    Suggest {
        partial: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Args)]
struct SearchArgs {
    /// Free text, e.g. "3 bedroom house under $600k near downtown"
    text: String,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    /// Exact bedroom count
    #[arg(long)]
    bedrooms: Option<u32>,
    #[arg(long)]
    min_bedrooms: Option<u32>,
    #[arg(long)]
    min_bathrooms: Option<f32>,
    /// Property type(s), comma separated
    #[arg(long = "type")]
    property_type: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Required amenity; repeat for several
    #[arg(long = "amenity")]
    amenities: Vec<String>,
    #[arg(long)]
    page: Option<usize>,
    #[arg(long)]
    page_size: Option<usize>,
    /// field[:asc|desc] with field one of relevance, price, date, bedrooms, square_feet
    #[arg(long, value_parser = parse_sort)]
    sort: Option<SortOrder>,
}

fn parse_sort(s: &str) -> std::result::Result<SortOrder, String> {
    s.parse::<SortOrder>().map_err(|e| e.to_string())
}

impl SearchArgs {
    fn into_request(self) -> SearchRequest {
        let filters = SearchFilters {
            location: self.location,
            min_price: self.min_price,
            max_price: self.max_price,
            bedrooms: self.bedrooms,
            min_bedrooms: self.min_bedrooms,
            min_bathrooms: self.min_bathrooms,
            property_type: self.property_type,
            amenities: self.amenities,
            ..SearchFilters::default()
        };
        SearchRequest {
            text: self.text,
            filters: (!filters.is_empty()).then_some(filters),
            page: self.page,
            page_size: self.page_size,
            sort: self.sort,
        }
    }
}

enum Backend {
    Memory(Arc<MemoryIndex>),
    Store(Arc<OpenSearchClient>),
}

impl Backend {
    fn index(&self) -> Arc<dyn ListingIndex> {
        match self {
            Backend::Memory(m) => Arc::clone(m) as Arc<dyn ListingIndex>,
            Backend::Store(s) => Arc::clone(s) as Arc<dyn ListingIndex>,
        }
    }

    fn store(&self) -> Arc<dyn ListingStore> {
        match self {
            Backend::Memory(m) => Arc::clone(m) as Arc<dyn ListingStore>,
            Backend::Store(s) => Arc::clone(s) as Arc<dyn ListingStore>,
        }
    }

    fn suggester(&self) -> Arc<dyn LocationSuggester> {
        match self {
            Backend::Memory(m) => Arc::clone(m) as Arc<dyn LocationSuggester>,
            Backend::Store(s) => Arc::clone(s) as Arc<dyn LocationSuggester>,
        }
    }
}

/// Embed every listing that arrived without a vector.
async fn backfill_embeddings(listings: &mut [Listing], embedder: &EmbeddingClient) -> Result<()> {
    let pending: Vec<usize> = (0..listings.len()).filter(|&i| listings[i].embedding.is_none()).collect();
    if pending.is_empty() {
        return Ok(());
    }
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} listings ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(embedder.provider_id().to_string());

    let batches: Vec<(Vec<usize>, Vec<String>)> = pending
        .chunks(embedder.options().batch_size)
        .map(|chunk| (chunk.to_vec(), chunk.iter().map(|&i| listings[i].search_text()).collect()))
        .collect();
    let mut results = stream::iter(batches)
        .map(|(chunk, texts)| {
            let embedder = embedder.clone();
            async move { embedder.embed_batch(&texts).await.map(|vectors| (chunk, vectors)) }
        })
        .buffered(EMBED_CONCURRENCY);
    while let Some(batch) = results.next().await {
        let (chunk, vectors) = batch.context("embedding listings")?;
        pb.inc(chunk.len() as u64);
        for (i, v) in chunk.into_iter().zip(vectors) {
            listings[i].embedding = Some(v);
        }
    }
    pb.finish_with_message("embedded");
    Ok(())
}

async fn backend(cli: &Cli, settings: &Settings, embedder: &EmbeddingClient) -> Result<Backend> {
    match &cli.listings {
        Some(path) => {
            let path = expand_path(path);
            let mut listings = load_listings(&path)?;
            backfill_embeddings(&mut listings, embedder).await?;
            let index = MemoryIndex::new(listings)?;
            info!(path = %path.display(), listings = index.len(), "serving from listings file");
            Ok(Backend::Memory(Arc::new(index)))
        }
        None => {
            let client = OpenSearchClient::new(&settings.store)?;
            info!(endpoint = %settings.store.endpoint, index = client.index_name(), "serving from document store");
            Ok(Backend::Store(Arc::new(client)))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(expand_path(path)),
        None => Config::load()?,
    };
    let settings = config.settings().context("loading settings")?;

    let provider = get_default_provider(&settings)?;
    let embedder = EmbeddingClient::from_settings(provider, &settings.embedding);
    let backend = backend(&cli, &settings, &embedder).await?;
    let engine = HybridSearchEngine::from_settings(backend.index(), backend.store(), embedder, &settings)?;

    match cli.command {
        Command::Search(args) => {
            let response = engine.search(args.into_request()).await?;
            print_json(&response)
        }
        Command::Get { id } => match engine.get_listing(&id).await? {
            Some(listing) => print_json(&listing),
            None => anyhow::bail!("listing '{id}' not found"),
        },
        Command::Suggest { partial, limit } => {
            let names = backend.suggester().suggest_locations(&partial, limit).await?;
            print_json(&names)
        }
        Command::Health => match &backend {
            Backend::Memory(m) => print_json(&json!({"backend": "memory", "listings": m.len()})),
            Backend::Store(s) => {
                let health = s.health().await?;
                print_json(&json!({
                    "backend": "opensearch",
                    "version": health.version,
                    "cluster": health.cluster_name,
                }))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_takes_text_and_optional_limit() {
        let cli = Cli::try_parse_from(["propsearch", "suggest", "aus"]).unwrap();
        assert!(matches!(cli.command, Command::Suggest { ref partial, limit: 10 } if partial == "aus"));

        let cli = Cli::try_parse_from(["propsearch", "--listings", "homes.json", "suggest", "old west", "--limit", "3"]).unwrap();
        assert_eq!(cli.listings.as_deref(), Some("homes.json"));
        assert!(matches!(cli.command, Command::Suggest { ref partial, limit: 3 } if partial == "old west"));

        assert!(Cli::try_parse_from(["propsearch", "suggest"]).is_err());
    }
}
