//! Archive Search CLI
//!
//! # Usage
//!
//! ```bash
//! # Free-text search
//! archive-search search -q "quarterly finance"
//!
//! # Field-scoped, sorted, paginated
//! archive-search search -q .pdf -f Extension --sort-by Size --sort-desc -l 20 -o 20
//!
//! # Rebuild the index from the manifest
//! archive-search --config archive.yaml rebuild --batch-size 500
//!
//! # Manifest and index counts
//! archive-search stats
//! ```

use archive_index::config::ArchiveConfig;
use archive_index::{
    IndexError, LexicalIndex, ManifestStore, QueryRouter, SearchRequest, SearchResult,
    SqliteManifest,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "archive_index=info,archive_manifest=info";

#[derive(Parser)]
#[command(name = "archive-search")]
#[command(about = "Search the archive index and keep it in step with the manifest", long_about = None)]
struct Cli {
    /// YAML configuration file (version: 1)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Manifest database (overrides config and environment)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Index directory (overrides config and environment)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the index
    Search {
        /// Query text; empty lists everything
        #[arg(short, long, default_value = "")]
        query: String,

        /// Restrict the query to one field (e.g. Summary, Extension)
        #[arg(short, long)]
        field: Option<String>,

        /// Results per page
        #[arg(short, long)]
        limit: Option<usize>,

        /// Results to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Sort field (e.g. Size, ModTime, Path)
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort descending
        #[arg(long)]
        sort_desc: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rebuild the index from the manifest
    Rebuild {
        /// Documents per commit
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Manifest statistics and index document count
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        if err
            .downcast_ref::<IndexError>()
            .is_some_and(IndexError::is_user_input)
        {
            eprintln!("Check the query syntax or sort field and try again.");
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("archive_index=debug,archive_manifest=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ArchiveConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => ArchiveConfig::from_yaml(path)?,
        None => ArchiveConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(path) = &cli.manifest {
        config.manifest.path = path.clone();
    }
    if let Some(dir) = &cli.index_dir {
        config.index.dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let index = Arc::new(LexicalIndex::open(&config.index.dir, config.index_options())?);

    match cli.command {
        Commands::Search {
            query,
            field,
            limit,
            offset,
            sort_by,
            sort_desc,
            format,
        } => {
            let mut request = SearchRequest::new(query.clone())
                .with_limit(limit.unwrap_or(config.search.default_limit))
                .with_offset(offset);
            if let Some(field) = field {
                request = request.with_field(field);
            }
            if let Some(sort_by) = sort_by {
                request = request.sorted_by(sort_by, sort_desc);
            }

            let router = QueryRouter::new(index.clone());
            let response = router.search(&request)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response.hits)?),
                OutputFormat::Text => {
                    output_text(&response.hits);
                    println!(
                        "\nFound {} results for query: {} (showing {}, {}ms)",
                        response.total_hits,
                        query,
                        response.hits.len(),
                        response.latency_ms
                    );
                }
            }
        }
        Commands::Rebuild { batch_size } => {
            let manifest = SqliteManifest::open(&config.manifest.path)?;
            let mut options = config.rebuild_options();
            if let Some(batch_size) = batch_size {
                options = options.with_batch_size(batch_size);
            }

            let report = index.rebuild(&manifest, &options)?;
            println!(
                "Indexed {} documents in {} batches ({}ms)",
                report.documents, report.batches, report.duration_ms
            );
        }
        Commands::Stats => {
            let manifest = SqliteManifest::open(&config.manifest.path)?;
            let stats = manifest.stats()?;
            println!("Manifest: {}", display_path(&config.manifest.path.to_string_lossy()));
            println!("  Files:     {}", stats.total_files);
            println!("  Dirs:      {}", stats.total_dirs);
            println!("  Processed: {}", stats.processed_files);
            println!("  Size:      {}", format_size(stats.total_size_bytes));
            println!("Index: {}", display_path(&config.index.dir.to_string_lossy()));
            println!("  Documents: {}", index.document_count()?);
        }
    }

    index.close()?;
    Ok(())
}

fn output_text(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let marker = if result.is_dir { "D" } else { " " };
        println!(
            "\n{}. [{}] {} ({:.2})",
            i + 1,
            marker,
            display_path(&result.path),
            result.score
        );
        println!(
            "   Size: {} | Modified: {}",
            format_size(result.size),
            format_date(result.mod_time)
        );
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
        if !result.metadata.content_type.is_empty() {
            println!("   Type: {}", result.metadata.content_type);
        }
        if i + 1 < results.len() {
            println!("   -----------------------------");
        }
    }
}

/// Show the home directory as `~`.
fn display_path(path: &str) -> String {
    if let Some(home) = dirs::home_dir() {
        let home = home.to_string_lossy();
        if !home.is_empty() {
            if let Some(rest) = path.strip_prefix(home.as_ref()) {
                return format!("~{}", rest);
            }
        }
    }
    path.to_string()
}

fn format_date(time: DateTime<Utc>) -> String {
    time.format("%b %d, %Y").to_string()
}

/// Binary units: `512 B`, `1.5 KB`, `3.0 MB`.
fn format_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    if size < UNIT {
        return format!("{} B", size);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", size as f64 / div as f64, suffix)
}
