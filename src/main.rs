//! ragbuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ragbuddy::{
    agent::{ChatReply, ChatRequest, Orchestrator},
    cli::{Args, Commands, IngestSource, Verbosity},
    config::Config,
    ingest::{
        DocumentLoader, FormFeedPages, IngestionPipeline, IngestionReport, JsonRecordSource,
        PagedLoader, RecordLoader, TextLoader, TokenChunker, WriteMode,
    },
    logging,
    memory::{embedder_from_config, ConversationMemory, EmbeddingStore},
    models::OllamaChatModel,
    tools::{policy_status_function, FunctionRegistry, FunctionSelection, PolicyDataset, ToolResult},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let verbosity = args.verbosity();

    match &args.command {
        Commands::Ingest { source } => run_ingest(&config, source, verbosity).await,
        Commands::Search { query, k } => {
            run_search(&config, query, k.unwrap_or(config.retrieval.top_k)).await
        }
        Commands::Ask {
            message,
            session,
            no_rag,
            ..
        } => {
            let orchestrator = build_orchestrator(&config).await?;
            let mut request = ChatRequest::new(session, message)
                .with_functions(args.command.function_selection());
            if *no_rag {
                request = request.without_retrieval();
            }

            let spinner = spinner(verbosity, "Thinking...");
            let reply = orchestrator.handle(request).await;
            spinner.finish_and_clear();

            print_reply(&reply?, verbosity);
            Ok(())
        }
        Commands::Chat {
            session, no_rag, ..
        } => {
            let orchestrator = build_orchestrator(&config).await?;
            run_chat(
                &orchestrator,
                session,
                !*no_rag,
                args.command.function_selection(),
                verbosity,
            )
            .await
        }
        Commands::Config => {
            println!("{}", format!("# {}", Config::config_path()?.display()).dimmed());
            println!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize config")?
            );
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<EmbeddingStore>> {
    let embedder = embedder_from_config(&config.model)
        .await
        .context("Failed to initialize embedding model")?;
    let store = EmbeddingStore::open(&config.store.path, embedder)
        .await
        .with_context(|| format!("Failed to open store {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

async fn run_ingest(config: &Config, source: &IngestSource, verbosity: Verbosity) -> Result<()> {
    let store = open_store(config).await?;
    let chunker = TokenChunker::from_config(&config.chunker).context("Invalid chunker settings")?;
    let pipeline =
        IngestionPipeline::new(chunker, Arc::clone(&store)).with_version(config.ingestion.version);

    let mode = |append: bool| if append { WriteMode::Append } else { WriteMode::Replace };
    let spinner = spinner(verbosity, "Ingesting...");

    let report = match source {
        IngestSource::Text { path, append } => {
            ingest(&pipeline, &TextLoader::new(path), mode(*append)).await
        }
        IngestSource::Pdf {
            path,
            trim_bottom_lines,
            append,
        } => {
            let loader = PagedLoader::pdf(path).with_trim_bottom_lines(*trim_bottom_lines);
            ingest(&pipeline, &loader, mode(*append)).await
        }
        IngestSource::Pages {
            path,
            trim_bottom_lines,
            append,
        } => {
            let loader = PagedLoader::new(FormFeedPages::new(path))
                .with_trim_bottom_lines(*trim_bottom_lines);
            ingest(&pipeline, &loader, mode(*append)).await
        }
        IngestSource::Records {
            path,
            key,
            fields,
            incremental,
            append,
        } => {
            let loader = RecordLoader::new(JsonRecordSource::new(path), key.clone(), fields.clone());
            if *incremental {
                pipeline
                    .ingest_incremental(&loader)
                    .await
                    .context("Ingestion failed")
            } else {
                ingest(&pipeline, &loader, mode(*append)).await
            }
        }
    };
    spinner.finish_and_clear();
    let report = report?;

    store
        .save(&config.store.path)
        .await
        .context("Failed to save store")?;

    println!(
        "{} {} ({} documents, {} chunks, {}, {}ms)",
        "✓ Ingested".green().bold(),
        report.source,
        report.documents,
        report.chunks,
        report.mode,
        report.elapsed_ms
    );
    println!("  store: {} records", store.len().await);
    Ok(())
}

async fn ingest(
    pipeline: &IngestionPipeline,
    loader: &dyn DocumentLoader,
    mode: WriteMode,
) -> Result<IngestionReport> {
    pipeline
        .ingest(loader, mode)
        .await
        .context("Ingestion failed")
}

async fn run_search(config: &Config, query: &str, k: usize) -> Result<()> {
    let store = open_store(config).await?;
    if store.is_empty().await {
        println!("{}", "Store is empty. Run `ragbuddy ingest` first.".yellow());
        return Ok(());
    }

    let hits = store.search(query, k).await.context("Search failed")?;
    for (i, hit) in hits.iter().enumerate() {
        let source = hit
            .chunk
            .get("source")
            .map(|v| v.to_string())
            .unwrap_or_default();
        println!(
            "{} {} {}",
            format!("[{}]", i + 1).cyan().bold(),
            format!("{:.3}", hit.score).yellow(),
            source.dimmed()
        );
        println!("    {}", hit.chunk.text.replace('\n', " "));
    }
    Ok(())
}

async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let store = open_store(config).await?;

    let model = OllamaChatModel::with_config(
        &config.model.url,
        &config.model.chat_model,
        Duration::from_secs(config.model.request_timeout_secs),
    )?;
    if !model.health_check().await {
        eprintln!(
            "{} Ollama is not reachable at {} (start it with: ollama serve)",
            "⚠".yellow(),
            config.model.url
        );
    }

    let dataset = Arc::new(PolicyDataset::new(config.policies.clone()));
    let registry = FunctionRegistry::new().with(policy_status_function(dataset)?)?;

    Ok(Orchestrator::from_config(
        config,
        Arc::new(model),
        store,
        Arc::new(registry),
        Arc::new(ConversationMemory::new()),
    ))
}

async fn run_chat(
    orchestrator: &Orchestrator,
    session: &str,
    use_retrieval: bool,
    functions: FunctionSelection,
    verbosity: Verbosity,
) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("{}", "ragbuddy chat".bold().cyan());
    println!(
        "Session {} - type {} for commands, {} to quit\n",
        session.green(),
        "/help".green(),
        "/exit".green()
    );

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(anyhow::anyhow!("Readline error: {}", err)),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "/exit" | "/quit" => break,
            "/help" => {
                println!("  /clear      forget this session's history");
                println!("  /functions  list registered functions");
                println!("  /exit       quit");
                continue;
            }
            "/clear" => {
                orchestrator.memory().clear(session).await;
                println!("{}", "History cleared".dimmed());
                continue;
            }
            "/functions" => {
                for name in orchestrator.registry().names() {
                    println!("  {}", name);
                }
                continue;
            }
            _ => {}
        }

        let mut request = ChatRequest::new(session, input).with_functions(functions.clone());
        if !use_retrieval {
            request = request.without_retrieval();
        }

        let spinner = spinner(verbosity, "Thinking...");
        let reply = orchestrator.handle(request).await;
        spinner.finish_and_clear();

        match reply {
            Ok(reply) => print_reply(&reply, verbosity),
            Err(err) => eprintln!("{} {}", "✗".red().bold(), err),
        }
    }

    Ok(())
}

fn print_reply(reply: &ChatReply, verbosity: Verbosity) {
    if verbosity.show_details() {
        for hit in &reply.retrieved {
            println!(
                "{} {:.3} {}",
                "context".dimmed(),
                hit.score,
                hit.chunk.text.chars().take(80).collect::<String>().dimmed()
            );
        }
        for invocation in &reply.invocations {
            let status = match &invocation.result {
                ToolResult::Success { .. } => "ok".green(),
                ToolResult::Failure { kind, .. } => kind.as_str().red(),
            };
            println!(
                "{} {}({}) {} {}ms",
                "call".dimmed(),
                invocation.name.cyan(),
                invocation.arguments,
                status,
                invocation.duration_ms
            );
        }
        let trace: Vec<String> = reply.trace.iter().map(ToString::to_string).collect();
        println!("{} {}", "trace".dimmed(), trace.join(" → "));
    }
    println!("{}", reply.content);
}

fn spinner(verbosity: Verbosity, message: &str) -> ProgressBar {
    if !verbosity.show_progress() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
