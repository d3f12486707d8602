use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ragbot_core::chat::{ChatAnswer, ConversationSession};
use ragbot_core::config::Config;
use ragbot_core::rag::RetrievalResult;
use ragbot_core::{IngestMode, IngestReport, RagEngine, RagError, Server};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragbot")]
#[command(about = "Answer questions from your own documents", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml", env = "RAGBOT_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve,

    #[command(about = "Index the documents directory")]
    Ingest {
        #[arg(short, long, help = "Directory to ingest instead of storage.documents_dir")]
        dir: Option<PathBuf>,

        #[arg(long, help = "Add to the existing index instead of replacing it")]
        append: bool,
    },

    #[command(about = "Ask a single question")]
    Ask {
        question: String,
    },

    #[command(about = "Start an interactive conversation")]
    Chat,

    #[command(about = "Show the passages retrieved for a query")]
    Search {
        query: String,

        #[arg(short, long)]
        k: Option<usize>,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set the answering model")]
    SetModel {
        #[arg(help = "Model name (e.g., 'sarvam-2b' or 'llama3.2:latest')")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve | Commands::Ingest { .. } => "info",
        _ => "warn",
    };
    init_tracing(default_level);

    match cli.command {
        Commands::Serve => serve(&cli.config).await,
        Commands::Ingest { dir, append } => ingest(&cli.config, dir, append).await,
        Commands::Ask { question } => ask(&cli.config, &question).await,
        Commands::Chat => chat(&cli.config).await,
        Commands::Search { query, k } => search(&cli.config, &query, k).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(&cli.config),
            ConfigCommands::SetModel { model } => set_model(&cli.config, &model),
        },
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads `path` if it exists, otherwise the defaults, then applies the
/// environment.
fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };
    let config = config.with_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn engine(config_path: &Path) -> Result<RagEngine> {
    let config = load_config(config_path)?;
    RagEngine::from_config(config)
        .await
        .context("Failed to start the RAG engine")
}

async fn serve(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let bind = config.server.bind.clone();
    let server = Server::new(config).await.context("Failed to start the RAG engine")?;

    println!("{} Listening on {}", "→".blue(), format!("http://{bind}").cyan());
    server
        .start()
        .await
        .with_context(|| format!("Server on {bind} failed"))
}

async fn ingest(config_path: &Path, dir: Option<PathBuf>, append: bool) -> Result<()> {
    let engine = engine(config_path).await?;
    let dir = dir.unwrap_or_else(|| engine.config().storage.documents_dir.clone());
    let mode = if append { IngestMode::Append } else { IngestMode::Replace };

    println!("{} Ingesting {}...", "→".blue(), dir.display());
    match engine.ingest_dir(&dir, mode).await {
        Ok(report) => {
            print_report(&report, &engine.config().storage.index_path);
            Ok(())
        }
        Err(RagError::EmptyInput) => {
            println!("{}", format!("No documents found in {}", dir.display()).yellow());
            Ok(())
        }
        Err(e) => Err(e).context("Ingestion failed"),
    }
}

fn print_report(report: &IngestReport, index_path: &Path) {
    println!("{} Ingested {} documents", "✓".green().bold(), report.documents);
    println!("  Chunks:   {}", report.chunks);
    println!("  Indexed:  {}", report.indexed);
    if report.skipped > 0 {
        println!("  Skipped:  {}", report.skipped.to_string().yellow());
    }
    if report.degraded > 0 {
        println!("  Degraded: {}", report.degraded.to_string().yellow());
    }
    println!("  Index:    {}", index_path.display());
}

async fn ask(config_path: &Path, question: &str) -> Result<()> {
    let engine = engine(config_path).await?;
    let session = engine.session().await;
    print_answer(&session.ask(question).await);
    Ok(())
}

async fn chat(config_path: &Path) -> Result<()> {
    let engine = engine(config_path).await?;
    let session = engine.session().await;

    println!("{}", "ragbot chat".bold().green());
    println!("Type {} to reset the conversation, {} to exit. Ctrl-C cancels an answer.", "/clear".bold(), "/quit".bold());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear().await;
                println!("{}", "History cleared".dimmed());
                continue;
            }
            question => ask_interruptible(&session, question).await,
        }
    }

    Ok(())
}

async fn ask_interruptible(session: &ConversationSession, question: &str) {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    match session.ask_cancellable(question, &cancel).await {
        Some(answer) => print_answer(&answer),
        None => println!("{}", "Cancelled".yellow()),
    }
    watcher.abort();
}

fn print_answer(answer: &ChatAnswer) {
    println!();
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("{}", "Sources:".bold());
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, describe_source(&source.metadata).cyan());
        }
    }
    println!();
}

fn describe_source(metadata: &ragbot_core::rag::Metadata) -> String {
    let source = metadata
        .get("source")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown source");
    match metadata.get("page") {
        Some(page) => format!("{source} (page {page})"),
        None => source.to_string(),
    }
}

async fn search(config_path: &Path, query: &str, k: Option<usize>) -> Result<()> {
    let engine = engine(config_path).await?;
    let k = k.unwrap_or(engine.config().rag.top_k);

    let results: RetrievalResult = match engine.search(query, k).await {
        Ok(results) => results,
        Err(RagError::IndexUnavailable) => {
            println!("{}", "No index yet. Run 'ragbot ingest' first.".yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context("Search failed"),
    };

    for (i, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("[{}]", i + 1).bold(),
            format!("{:.4}", result.score).green(),
            describe_source(&result.chunk.metadata).cyan()
        );
        println!("    {}", result.chunk.content.replace('\n', "\n    "));
        println!();
    }
    Ok(())
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "Provider:".bold());
    println!("  Kind:            {:?}", config.provider.kind);
    println!("  Base URL:        {}", config.provider.base_url);
    println!("  API key:         {}", if config.provider.api_key.is_some() { "set" } else { "not set" });
    println!("  Timeout:         {}s", config.provider.timeout_secs);
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Max tokens:      {}", config.llm.max_tokens);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:           {}", config.embedding.model.cyan());
    println!("  Dimension:       {}", config.embedding.dimension);
    println!("  On failure:      {:?}", config.embedding.on_failure);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk size:      {}", config.rag.chunk_size);
    println!("  Chunk overlap:   {}", config.rag.chunk_overlap);
    println!("  Top K:           {}", config.rag.top_k);
    println!("  Metric:          {:?}", config.rag.metric);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Documents:       {}", config.storage.documents_dir.display());
    println!("  Index:           {}", config.storage.index_path.display());
    println!();
    println!("{}", "Server:".bold());
    println!("  Bind:            {}", config.server.bind);
    println!("  API prefix:      {}", config.server.api_prefix);

    Ok(())
}

/// Edits only `llm.model`, leaving the rest of the file as written.
fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let mut config: serde_yaml::Value = if config_path.exists() {
        let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config")?
    } else {
        serde_yaml::Value::Mapping(Default::default())
    };

    let root = config
        .as_mapping_mut()
        .context("Config file is not a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    llm.as_mapping_mut()
        .context("`llm` is not a YAML mapping")?
        .insert(
            serde_yaml::Value::String("model".to_string()),
            serde_yaml::Value::String(model.to_string()),
        );

    let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;
    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_model_creates_and_preserves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rag:\n  top_k: 5\n").unwrap();

        set_model(&path, "tiny").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.model, "tiny");
        assert_eq!(config.rag.top_k, 5);

        let fresh = dir.path().join("fresh.yaml");
        set_model(&fresh, "other").unwrap();
        assert_eq!(Config::load(&fresh).unwrap().llm.model, "other");
    }

    #[test]
    fn test_describe_source_with_page() {
        let mut metadata = ragbot_core::rag::Metadata::new();
        metadata.insert("source".into(), "manual.pdf".into());
        metadata.insert("page".into(), 2.into());
        assert_eq!(describe_source(&metadata), "manual.pdf (page 2)");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["ragbot", "search", "sky", "-k", "5"]);
        assert!(matches!(cli.command, Commands::Search { k: Some(5), .. }));

        let cli = Cli::parse_from(["ragbot", "ingest", "--append"]);
        assert!(matches!(cli.command, Commands::Ingest { dir: None, append: true }));
    }
}
