//! # Tasker Queue Bridge
//!
//! Command-line entry point: run the consumer against PGMQ, process a single
//! delivery event, print the outcome state machine definition, or run an
//! in-memory demonstration of the redelivery protocol.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tasker_queue_bridge::bootstrap::BridgeSystem;
use tasker_queue_bridge::config::{BridgeConfig, ConfigLoader};
use tasker_queue_bridge::ingestion::{QueueEvent, RecordOutcome};
use tasker_queue_bridge::logging::init_tracing;
#[cfg(feature = "postgres")]
use tasker_queue_bridge::messaging::PgmqQueueService;
use tasker_queue_bridge::messaging::QueueProvider;
use tasker_queue_bridge::state_machine::OutcomeStateMachine;

#[derive(Parser)]
#[command(name = "tasker-queue-bridge")]
#[command(about = "Bridge a message queue to workflow executions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the source queue until interrupted
    Run,

    /// Process one delivery event file and print the batch report
    Handle {
        /// JSON file shaped like `{"Records": [...]}`
        event: PathBuf,
    },

    /// Print the outcome state machine definition document
    Definition,

    /// Run the protocol end to end against in-memory queues
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Handle { event } => handle(config, event).await,
        Commands::Definition => definition(&config),
        Commands::Demo => demo(config).await,
    }
}

async fn connect(config: &BridgeConfig) -> Result<QueueProvider> {
    match &config.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let service = PgmqQueueService::new(url)
                .await
                .context("Failed to connect to PGMQ")?;
            Ok(QueueProvider::Pgmq(service))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => bail!("DATABASE_URL is set but the postgres feature is disabled"),
        None => Ok(QueueProvider::in_memory().0),
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    if config.database_url.is_none() {
        bail!("DATABASE_URL must be set to run the consumer");
    }
    let queue = connect(&config).await?;
    let bridge = BridgeSystem::bootstrap(config, queue).await?;

    let handle = bridge.start();
    info!("Bridge running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    let stats = handle.stop().await;
    info!(
        batches = stats.batches,
        records = stats.records,
        executions_started = stats.executions_started,
        "Shutdown complete"
    );
    Ok(())
}

async fn handle(config: BridgeConfig, event_path: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&event_path)
        .with_context(|| format!("Failed to read {}", event_path.display()))?;
    let event: QueueEvent = serde_json::from_str(&raw).context("Invalid delivery event")?;

    let queue = connect(&config).await?;
    let bridge = BridgeSystem::bootstrap(config, queue).await?;

    let outcome = bridge.handle(&event).await;
    for record in &outcome.records {
        match record {
            RecordOutcome::Started {
                message_id,
                execution_id,
            } => eprintln!("started    {message_id} -> {execution_id}"),
            RecordOutcome::Malformed { index, error } => {
                eprintln!("malformed  record {index}: {error}")
            }
            RecordOutcome::Failed { message_id, error } => {
                eprintln!("failed     {message_id}: {error}")
            }
        }
    }
    bridge.engine.wait_for_all().await;

    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    Ok(())
}

fn definition(config: &BridgeConfig) -> Result<()> {
    let (queue, _service) = QueueProvider::in_memory();
    let machine = OutcomeStateMachine::new(queue)
        .with_rearm_visibility(config.rearm_visibility())
        .with_timeout(config.execution_timeout());

    println!("{}", serde_json::to_string_pretty(&machine.definition_document())?);
    Ok(())
}

async fn demo(config: BridgeConfig) -> Result<()> {
    let (queue, service) = QueueProvider::in_memory();
    let bridge = BridgeSystem::bootstrap(config, queue.clone()).await?;
    let source = bridge.config.source_queue_url.clone();
    let dead_letter = bridge.config.dead_letter_queue_url.clone();

    queue.send_message(&source, r#"{"order": 1}"#).await?;
    queue.send_message(&source, r#"{"order": 2, "failed": true}"#).await?;
    info!("Sent one succeeding and one failing message");

    let handle = bridge.start();
    let settle = bridge.config.rearm_visibility() + bridge.config.poll_interval() * 4;
    tokio::time::sleep(settle.max(Duration::from_secs(1))).await;
    handle.stop().await;

    let status = bridge.status().await?;
    println!("source queue:      {} message(s)", status.source_queue.message_count);
    println!("dead-letter queue: {} message(s)", status.dead_letter_queue.message_count);
    for message in service.snapshot(&dead_letter).await {
        println!("  dead-lettered {}: {}", message.message_id, message.body);
    }
    for record in bridge.engine.list_executions() {
        println!(
            "execution {} {} {}",
            record.execution_id,
            record.status,
            record.output.map(|o| o.to_string()).unwrap_or_default()
        );
    }
    Ok(())
}
