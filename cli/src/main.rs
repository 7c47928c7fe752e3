//! CLI entrypoint for cedar
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod output;

use anyhow::{Context, Result, anyhow};
use args::Cli;
use cedar_application::{EventBus, EventSink, LlmGateway, OrchestrateInput, OrchestrateUseCase};
use cedar_domain::Outcome;
use cedar_infrastructure::{
    ChannelEventSink, ConfigLoader, FileConfig, JsonlConversationLogger, JsonlEventSink,
    MarkdownNoteSink, OpenAiGateway, build_registry, config::expand_home,
};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level; RUST_LOG wins when set
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let message = cli.message.clone().context("A message is required")?;

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    if let Some(max) = cli.max_iterations {
        config.orchestrator.max_iterations = max;
    }
    config.validate()?;

    info!("Starting cedar");

    // === Dependency Injection ===
    let use_case = build_use_case(&config)?;
    let params = use_case.params().clone();

    // Ctrl-C stops the loop at the next suspension point
    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with the best available result");
            ctrl_c.cancel();
        }
    });

    let input = OrchestrateInput::new(message).with_cancellation(cancellation);

    if cli.json {
        let sink: Arc<dyn EventSink> = Arc::new(JsonlEventSink::stdout());
        let bus = EventBus::new(sink, params.ack_timeout);
        use_case.execute(input, &bus).await?;
        return Ok(());
    }

    // Human-readable mode: print events as they arrive, acknowledging each
    let (sink, mut rx) = ChannelEventSink::channel(EVENT_BUFFER);
    let bus = EventBus::new(Arc::new(sink), params.ack_timeout);
    let acks = bus.ack_registry();
    let verbose = cli.verbose > 0;
    let printer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if let Some(text) = output::render(&envelope, verbose) {
                println!("{}", text);
            }
            if let Some(eid) = &envelope.eid {
                acks.acknowledge(eid);
            }
        }
    });

    let outcome = use_case.execute(input, &bus).await;
    // Dropping the bus closes the channel so the printer can finish
    drop(bus);
    let _ = printer.await;

    match outcome? {
        Outcome::Final(answer) => info!(
            iterations = answer.payload.iterations,
            termination = answer.payload.termination.as_str(),
            "Orchestration finished"
        ),
        Outcome::Clarify(clarification) => {
            info!(iterations = clarification.iterations, "Clarification requested")
        }
    }

    Ok(())
}

fn build_use_case(config: &FileConfig) -> Result<OrchestrateUseCase> {
    let gateway: Option<Arc<dyn LlmGateway>> = match OpenAiGateway::from_config(&config.reviewer) {
        Ok(gateway) => Some(Arc::new(gateway)),
        Err(e) => {
            warn!("Reasoning backend unavailable, running without it: {}", e);
            None
        }
    };

    let disabled = config.agents.disabled_kinds()?;
    let registry = build_registry(gateway.clone(), &config.agents.settings(), &disabled);
    info!(agents = registry.len(), "Agent registry ready");

    let mut use_case =
        OrchestrateUseCase::new(Arc::new(registry), gateway, config.execution_params());

    if let Some(directory) = &config.notes.directory {
        let sink = MarkdownNoteSink::new(expand_home(directory));
        use_case = use_case.with_note_sink(Arc::new(sink));
    }
    if let Some(path) = &config.logging.conversation_log
        && let Some(logger) = JsonlConversationLogger::new(expand_home(path))
    {
        use_case = use_case.with_conversation_logger(Arc::new(logger));
    }

    Ok(use_case)
}
