use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hopper_core::app::ConsumerBuilder;
use hopper_core::domain::{Disposition, EventKind, HandlerError, Message, Verdict};
use hopper_core::impls::InMemoryChannel;
use hopper_core::ports::MessageHandler;
use hopper_core::{Consumer, ConsumerConfig};

const DEFAULT_QUEUE: &str = "hello";

#[derive(Parser)]
#[command(name = "hopper")]
#[command(about = "Queue consumer demo on an in-memory channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML config file (HOPPER_* environment variables override it)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Messages to seed into the in-memory channel before running
    #[arg(long, default_value_t = 5, global = true)]
    seed: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Consume messages until the target, the memory limit or Ctrl-C
    Consume {
        /// Stop after this many messages (0 = no limit)
        #[arg(long, short = 'm', default_value_t = 0)]
        messages: u64,

        /// Stop once resident memory reaches this many megabytes
        #[arg(long, short = 'l')]
        memory_limit: Option<u64>,

        /// Seconds to wait for a delivery before re-checking stop conditions
        #[arg(long)]
        idle_timeout: Option<u64>,
    },
    /// Purge every message from the configured queue
    Purge,
}

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

/// Greets valid payloads. Anything that is not `{"name": ...}` fails.
struct HelloHandler;

#[async_trait]
impl MessageHandler for HelloHandler {
    async fn handle(&self, message: &Message) -> Result<Option<Disposition>, HandlerError> {
        let payload: HelloPayload = message.json()?;
        info!(delivery_tag = %message.delivery_tag(), "Hello, {}!", payload.name);
        Ok(None)
    }
}

fn load_config(cli: &Cli) -> Result<ConsumerConfig, Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => ConsumerConfig::from_toml_file(path)?,
        None => ConsumerConfig::new(DEFAULT_QUEUE),
    };
    Ok(config.with_env_overrides()?)
}

/// Every third message is not JSON so the error path has something to do.
async fn seed(channel: &InMemoryChannel, queue: &str, count: usize) -> Result<(), Box<dyn Error>> {
    for i in 0..count {
        let payload = if i % 3 == 2 {
            b"not json".to_vec()
        } else {
            serde_json::to_vec(&serde_json::json!({ "name": format!("hopper-{i}") }))?
        };
        channel.publish(queue, payload).await;
    }
    info!(queue, count, "seeded in-memory channel");
    Ok(())
}

fn build(channel: Arc<InMemoryChannel>, config: ConsumerConfig) -> Result<Consumer, Box<dyn Error>> {
    let consumer = ConsumerBuilder::new(channel, config)
        .handler(HelloHandler)
        // one retry per message, then drop
        .listen(EventKind::Error, 0, |event| {
            if event.message.redelivered() {
                Verdict::Drop
            } else {
                Verdict::Requeue
            }
        })
        .listen(EventKind::Dropped, 0, |event| {
            warn!(
                delivery_tag = %event.message.delivery_tag(),
                error = ?event.error.map(ToString::to_string),
                "message dropped"
            );
            Verdict::Pass
        })
        .build()?;
    Ok(consumer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    let channel = InMemoryChannel::new();
    seed(&channel, &config.queue, cli.seed).await?;

    match cli.command {
        Command::Consume {
            messages,
            memory_limit,
            idle_timeout,
        } => {
            if memory_limit.is_some() {
                config.memory_limit_mb = memory_limit;
            }
            if let Some(secs) = idle_timeout {
                config.idle_timeout_secs = secs;
            }

            let mut consumer = build(channel, config)?;

            let stop = consumer.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c received, stopping after the current message");
                    stop.request_stop();
                }
            });

            let target = (messages > 0).then_some(messages);
            let report = consumer.consume(target).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Purge => {
            let consumer = build(channel, config)?;
            let purged = consumer.purge().await?;
            println!("purged {purged} message(s) from {}", consumer.queue());
        }
    }

    Ok(())
}
