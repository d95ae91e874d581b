//! pdf-rag command line
//!
//! Run with: cargo run -p pdf-rag -- query "What does the warranty cover?" --ingest terms.pdf

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_rag::config::{default_config_path, RagConfig};
use pdf_rag::{DocumentId, IngestRequest, QueryRequest, RagPipeline, SessionId};

#[derive(Parser)]
#[command(name = "pdf-rag", about = "Ask questions about your documents", version)]
struct Cli {
    /// Configuration file (TOML); defaults to the user config directory
    #[arg(long, global = true, env = "PDF_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse, chunk, embed and index a document
    Ingest {
        /// Document to ingest (.pdf, .txt or .md)
        file: PathBuf,
        /// Session the document belongs to
        #[arg(long)]
        session: Option<String>,
        /// Document id (generated when omitted)
        #[arg(long)]
        doc_id: Option<String>,
    },

    /// Answer a question from the indexed documents
    Query {
        /// The question
        question: String,
        /// Restrict retrieval to one session
        #[arg(long)]
        session: Option<String>,
        /// Restrict retrieval to one document
        #[arg(long)]
        doc_id: Option<String>,
        /// Number of passages to retrieve (default: retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,
        /// Ingest these files first (useful with the in-memory index)
        #[arg(long = "ingest", value_name = "FILE")]
        ingest: Vec<PathBuf>,
    },

    /// Delete indexed passages of a document or a session
    Delete {
        #[arg(long, conflicts_with = "session", required_unless_present = "session")]
        doc_id: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    let config = match path {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                RagConfig::from_file(&default_path).with_context(|| {
                    format!("failed to load config from {}", default_path.display())
                })?
            } else {
                RagConfig::from_env()?
            }
        }
    };
    Ok(config)
}

fn spinner(message: String) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

async fn ingest_file(
    pipeline: &RagPipeline,
    path: &Path,
    session: Option<&str>,
    doc_id: Option<&str>,
) -> Result<pdf_rag::IngestReport> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut request = IngestRequest::new(filename, data);
    if let Some(session) = session {
        request = request.with_session(SessionId::new(session));
    }
    if let Some(doc_id) = doc_id {
        request = request.with_doc_id(DocumentId::new(doc_id));
    }

    let bar = spinner(format!("Ingesting {}", path.display()))?;
    let report = pipeline.ingest(request).await;
    bar.finish_and_clear();
    Ok(report?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);
    tracing::info!("  - Generator: {:?} / {}", config.llm.provider, config.llm.model);
    tracing::info!("  - Index: {:?} / {}", config.vector_db.backend, config.vector_db.collection);
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);

    let pipeline = RagPipeline::from_config(config)?;
    pipeline.init().await?;

    match cli.command {
        Command::Ingest {
            file,
            session,
            doc_id,
        } => {
            let report =
                ingest_file(&pipeline, &file, session.as_deref(), doc_id.as_deref()).await?;
            print_json(&report)?;
        }

        Command::Query {
            question,
            session,
            doc_id,
            top_k,
            ingest,
        } => {
            for file in &ingest {
                let report = ingest_file(&pipeline, file, session.as_deref(), None).await?;
                tracing::info!("{} -> {} chunks", report.filename, report.chunk_count);
            }

            let mut request = QueryRequest::new(question);
            if let Some(top_k) = top_k {
                request = request.with_top_k(top_k);
            }
            if let Some(session) = session {
                request = request.with_session(SessionId::new(session));
            }
            if let Some(doc_id) = doc_id {
                request = request.with_doc_id(DocumentId::new(doc_id));
            }

            let bar = spinner("Thinking".to_string())?;
            let response = pipeline.query(request).await;
            bar.finish_and_clear();
            print_json(&response?)?;
        }

        Command::Delete { doc_id, session } => {
            let removed = match (doc_id, session) {
                (Some(doc_id), _) => pipeline.delete_document(&DocumentId::new(doc_id)).await?,
                (None, Some(session)) => pipeline.delete_session(&SessionId::new(session)).await?,
                (None, None) => bail!("pass --doc-id or --session"),
            };
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}
