//! CLI binary for running the Newsdesk pipeline.

mod config;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use newsdesk_llm::{BackoffPolicy, LoggingGateway, OpenAiGateway, RetryingGateway};
use newsdesk_pipeline::{
    load_recipients, standard_registry, validate, Collaborators, CourtListenerFeed, CursorStore,
    DigestNotifier, FileCursorStore, HandlerRegistry, JsonlSink, OutboxDelivery, PipelineEvent,
    PipelineExecutor, Severity, StageGraph,
};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "newsdesk", version, about = "Court-opinion news pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass: fetch, screen, write, review, publish, notify
    Run {
        #[command(flatten)]
        settings: Settings,

        /// Print pipeline events as JSON lines on stdout
        #[arg(long)]
        events: bool,
    },

    /// Print the stage graph and its validation diagnostics
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { settings, events } => cmd_run(settings, events).await?,
        Commands::Graph => cmd_graph(),
    }

    Ok(())
}

fn cmd_graph() {
    let graph = StageGraph::standard();
    println!("Entry: {}", graph.entry());
    print!("{graph}");

    // Structural rules only; handler wiring needs live collaborators.
    let diagnostics: Vec<_> = validate(&graph, &HandlerRegistry::new())
        .into_iter()
        .filter(|d| d.rule != "handler_registered")
        .collect();
    if diagnostics.is_empty() {
        println!("\nGraph is valid");
        return;
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(fix) = &diag.fix {
            println!("  fix: {fix}");
        }
    }
    if has_error {
        std::process::exit(1);
    }
}

/// Writes every event as a JSON line until the channel closes, then hands
/// the writer back.
fn spawn_event_printer<W>(mut rx: broadcast::Receiver<PipelineEvent>, mut out: W) -> JoinHandle<W>
where
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        let _ = writeln!(out, "{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        let _ = out.flush();
        out
    })
}

async fn cmd_run(settings: Settings, print_events: bool) -> anyhow::Result<()> {
    settings.check()?;
    let config = settings.pipeline_config();

    let state_file = settings
        .state_file
        .clone()
        .context("state file not configured")?;
    let cursor_store = Arc::new(FileCursorStore::new(state_file));

    let api_key = settings.api_key.clone().unwrap_or_default();
    let gateway = OpenAiGateway::new(api_key)
        .with_base_url(settings.api_base_url.clone())
        .with_model(settings.model.clone())
        .with_temperature(settings.temperature)
        .with_timeout(settings.timeout());
    let gateway = Arc::new(LoggingGateway::new(RetryingGateway::new(
        gateway,
        settings.retries,
        BackoffPolicy::default(),
    )));

    let recipients = match &settings.subscriptions {
        Some(path) => load_recipients(path).await?,
        None => {
            tracing::warn!("No subscriptions file configured, digest will not be sent");
            Vec::new()
        }
    };
    let notifier = DigestNotifier::new(
        Arc::new(OutboxDelivery::new(settings.outbox_dir.clone())),
        recipients,
    );

    let collab = Collaborators {
        cursor_store: cursor_store.clone(),
        feed: Arc::new(CourtListenerFeed::new(
            settings.feed_url.clone(),
            settings.feed_pages,
            settings.timeout(),
        )?),
        gateway: gateway.clone(),
        sink: Arc::new(JsonlSink::new(settings.output_dir.clone())),
        notifier: Arc::new(notifier),
    };

    let executor = PipelineExecutor::new(standard_registry(&collab, &config), config);
    let printer = print_events
        .then(|| spawn_event_printer(executor.events().subscribe(), std::io::stdout()));

    let result = executor.run(&StageGraph::standard()).await;
    // Dropping the executor closes the channel so the printer can drain it.
    drop(executor);
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Event printer stopped early");
        }
    }
    let result = result?;
    let state = &result.state;

    cursor_store
        .save(state.cursor)
        .await
        .context("failed to persist cursor")?;

    println!("\nRun {} completed", result.run_id);
    println!(
        "Stages: {}",
        result
            .stage_trace
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!("Revisions: {}", result.revisions());
    println!("Cursor: {}", state.cursor);
    println!("Articles: {}", state.output_count.unwrap_or(0));
    if let Some(location) = &state.output_location {
        println!("Output: {location}");
    }
    if let Some(status) = state.delivery_status {
        println!("Delivery: {status}");
    }
    if !state.best_drafts.is_empty() {
        println!("Best drafts:");
        for (id, best) in state.best_drafts.iter() {
            println!("  #{id}: {:.2}", best.score);
        }
    }
    println!(
        "Generation calls: {} ({} failed)",
        gateway.total_calls(),
        gateway.total_failures()
    );

    Ok(())
}
