//! PDF chat binary
//!
//! Run with: cargo run -p pdf-chat -- serve

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_chat::{
    config::ChatConfig,
    generation::{get_conversation_chain, ConversationMemory},
    ingestion::{IngestPipeline, UploadedFile},
    providers::build_providers,
    retrieval::get_vectors_from_db,
    server::PdfChatServer,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(version, about = "Chat with your PDFs", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web UI and API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Process PDF files or directories into the saved index
    Ingest {
        /// PDF files or directories containing PDFs
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask one question against the saved index
    Ask {
        /// The question
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_chat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ChatConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Ingest { paths } => ingest(config, &paths).await,
        Command::Ask { question } => ask(config, &question).await,
    }
}

async fn serve(config: ChatConfig) -> anyhow::Result<()> {
    config.validate()?;

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                   Chat With Your PDFs 📚                  ║
║        Ask questions about the documents you upload       ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    tracing::info!("Configuration loaded");
    tracing::info!("  - Provider: {:?}", config.provider);
    tracing::info!("  - Embedding model: {}", config.embedding_model());
    tracing::info!("  - Chat model: {}", config.chat_model());
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Data directory: {}", config.vector_store.data_dir.display());

    let server = PdfChatServer::new(config).await?;

    if !server.state().llm().health_check().await.unwrap_or(false) {
        tracing::warn!(
            "Chat provider '{}' is not reachable; questions will fail until it is",
            server.state().llm().name()
        );
    }

    println!("\nServer starting...");
    println!("  UI: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

/// Expand files and directories into the PDF files they contain
fn collect_pdfs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut pdfs = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_pdf_path(entry.path()) {
                    pdfs.push(entry.into_path());
                }
            }
        } else {
            pdfs.push(path.clone());
        }
    }

    pdfs
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

async fn ingest(config: ChatConfig, paths: &[PathBuf]) -> anyhow::Result<()> {
    config.validate()?;
    let (embedder, _) = build_providers(&config)?;

    let pdfs = collect_pdfs(paths);
    if pdfs.is_empty() {
        anyhow::bail!("No PDF files found in the given paths");
    }

    let started = Instant::now();
    let pipeline = IngestPipeline::new(&config.chunking);

    let progress = ProgressBar::new(pdfs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?.progress_chars("=> "),
    );

    let mut files = Vec::with_capacity(pdfs.len());
    for path in &pdfs {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        progress.set_message(filename.clone());

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(UploadedFile::new(filename, data));
        progress.inc(1);
    }
    progress.finish_with_message("read");

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner.set_message("Extracting text...");
    let (parsed, failures) = pipeline.parse_files(files).await;

    spinner.set_message(format!("Embedding with {}...", embedder.model()));
    let batch = pipeline
        .build_index(parsed, failures, started, embedder.as_ref(), &config.vector_store)
        .await;
    spinner.finish_and_clear();

    let batch = batch?;
    println!("{}", batch.response.summary());
    println!(
        "Index saved to {}",
        config.vector_store.data_dir.join(pdf_chat::retrieval::INDEX_FILE).display()
    );

    Ok(())
}

async fn ask(config: ChatConfig, question: &str) -> anyhow::Result<()> {
    config.validate()?;
    let (embedder, llm) = build_providers(&config)?;

    let store = get_vectors_from_db(&config.vector_store, embedder.model())
        .await?
        .ok_or(pdf_chat::Error::NoDocuments)?;

    let chain = get_conversation_chain(store, embedder, llm, config.retrieval.top_k);
    let mut memory = ConversationMemory::new();
    let output = chain.ask(&mut memory, question).await?;

    println!("{}\n", output.answer);
    if !output.sources.is_empty() {
        println!("Sources:");
        for (i, source) in output.sources.iter().enumerate() {
            let snippet = pdf_chat::types::SourceSnippet::from_chunk(&source.chunk, source.similarity);
            println!("  [{}] {} ({:.2})", i + 1, snippet.format_inline(), snippet.similarity_score);
        }
    }

    Ok(())
}
