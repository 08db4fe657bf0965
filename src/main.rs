//! Scanshelf
//!
//! Command-line front end for a local scanned-document library: list,
//! inspect, render, import, tag and delete documents in one directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanshelf::config::Config;
use scanshelf::coordinator::LoadCoordinator;
use scanshelf::document::{DocumentError, DocumentFormat, DocumentRepository, PageRenderer};
use scanshelf::formats::MupdfRenderer;
use scanshelf::store::FileDocumentStore;

/// Manage a directory of scanned documents
#[derive(Debug, Parser)]
#[command(name = "scanshelf", about, version)]
struct Cli {
    /// Library directory (overrides SCANSHELF_LIBRARY_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List documents of one format
    List {
        #[arg(long, default_value = "pdf")]
        format: DocumentFormat,
    },

    /// Show one document with its pages
    Show {
        id: String,

        #[arg(long, default_value = "pdf")]
        format: DocumentFormat,
    },

    /// Render one page to a PNG file
    Render {
        id: String,

        #[arg(long, default_value = "pdf")]
        format: DocumentFormat,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Output file
        #[arg(long, short, value_name = "FILE")]
        out: PathBuf,

        /// Bound on the longer side in pixels
        #[arg(long)]
        max_dimension: Option<u32>,
    },

    /// Show PDF metadata
    Info { id: String },

    /// Copy a PDF or image into the library
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Document id; a UUID when omitted
        #[arg(long)]
        id: Option<String>,
    },

    /// Set title, tags or score
    Tag {
        id: String,

        #[arg(long, default_value = "pdf")]
        format: DocumentFormat,

        #[arg(long)]
        title: Option<String>,

        /// Replaces all tags; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        score: Option<i64>,
    },

    /// Delete every file backing a document
    Delete { id: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSummary {
    id: String,
    title: String,
    format: DocumentFormat,
    page_count: usize,
    tags: Vec<String>,
    score: i64,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanshelf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.library.clone() {
        config.library.dir = dir;
    }

    let renderer: Arc<dyn PageRenderer> = Arc::new(MupdfRenderer::new());
    let store = if config.library.persist_deletions {
        FileDocumentStore::open_persistent(&config.library.dir, Arc::clone(&renderer))
    } else {
        FileDocumentStore::open(&config.library.dir, Arc::clone(&renderer))
    }
    .with_context(|| format!("opening library {}", config.library.dir.display()))?;

    let budget = config.cache_budget();
    tracing::debug!(cache_bytes = budget.bytes, "Resolved cache budget");

    let result = run(cli.command, &config, store, renderer, budget.bytes).await;
    if let Err(e) = &result {
        match e.downcast_ref::<DocumentError>() {
            Some(err) => tracing::error!(kind = ?err.kind(), error = %err, "Command failed"),
            None => tracing::error!(error = %e, "Command failed"),
        }
    }
    result
}

async fn run(
    command: Commands,
    config: &Config,
    store: FileDocumentStore,
    renderer: Arc<dyn PageRenderer>,
    cache_bytes: usize,
) -> anyhow::Result<()> {
    match command {
        Commands::List { format } => {
            let documents = store.list_documents(format).await?;
            let summaries: Vec<DocumentSummary> = documents
                .into_iter()
                .map(|doc| DocumentSummary {
                    page_count: doc.pages.len(),
                    id: doc.id,
                    title: doc.title,
                    format: doc.format,
                    tags: doc.tags,
                    score: doc.score,
                })
                .collect();
            print_json(&summaries)
        }

        Commands::Show { id, format } => {
            let document = store
                .get_document(&id, format)
                .await?
                .with_context(|| format!("no {} document with id {}", format, id))?;
            print_json(&document)
        }

        Commands::Render {
            id,
            format,
            page,
            out,
            max_dimension,
        } => {
            let mut options = config.coordinator_options();
            if max_dimension.is_some() {
                options.max_dimension = max_dimension;
            }
            let coordinator =
                LoadCoordinator::new(Arc::new(store), renderer, cache_bytes, options);

            let bitmap = coordinator.load_page(&id, format, page).await?;
            let image = bitmap
                .to_rgba_image()
                .context("rendered bitmap was already recycled")?;
            image
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;

            tracing::info!(
                id = %id,
                page,
                width = image.width(),
                height = image.height(),
                out = %out.display(),
                "Rendered page"
            );
            coordinator.shutdown();
            Ok(())
        }

        Commands::Info { id } => {
            let metadata = tokio::task::spawn_blocking(move || store.metadata(&id)).await??;
            print_json(&metadata)
        }

        Commands::Import { file, id } => {
            let document =
                tokio::task::spawn_blocking(move || store.import_file(&file, id.as_deref()))
                    .await??;
            print_json(&document)
        }

        Commands::Tag {
            id,
            format,
            title,
            tags,
            score,
        } => {
            let mut document = store
                .get_document(&id, format)
                .await?
                .with_context(|| format!("no {} document with id {}", format, id))?;

            if let Some(title) = title {
                document.title = title;
            }
            if !tags.is_empty() {
                document.tags = tags;
            }
            if let Some(score) = score {
                document.score = score;
            }

            store.save_document(&document).await?;
            print_json(&document)
        }

        Commands::Delete { id } => {
            let coordinator = LoadCoordinator::new(
                Arc::new(store),
                renderer,
                cache_bytes,
                config.coordinator_options(),
            );
            let outcome = coordinator.delete_document(&id).await?;
            if outcome.is_noop() {
                tracing::info!(id = %id, "Nothing to delete");
            }
            print_json(&outcome.removed)
        }
    }
}
