//! bssidcast - Wi-Fi BSSID scanner and MQTT publisher.
//!
//! Run with: `cargo run -p bssidcast-service -- run`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use bssidcast_core::{PublishScheduler, SchedulerEvent};
use bssidcast_service::config::default_config_path;
use bssidcast_service::{Config, MqttPublishClient, ProviderKind, format_display_view, provider};

/// Scan nearby Wi-Fi access points and publish them to MQTT.
#[derive(Parser, Debug)]
#[command(name = "bssidcast")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Broker URI (overrides config).
    #[arg(short, long, global = true)]
    broker: Option<String>,

    /// MQTT topic (overrides config).
    #[arg(short, long, global = true)]
    topic: Option<String>,

    /// Seconds between scans (overrides config).
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Scanning tool (overrides config).
    #[arg(short, long, global = true, value_enum)]
    provider: Option<ProviderKind>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish snapshots until interrupted.
    Run {
        /// Publish a single snapshot and exit.
        #[arg(short, long)]
        once: bool,
    },

    /// Scan once and print the results (default).
    Scan,

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    match args.command {
        Some(Command::Config {
            action: ConfigAction::Init { force },
        }) => cmd_config_init(args.config, force),
        Some(Command::Config {
            action: ConfigAction::Show,
        }) => {
            let config = load_config(&args)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Run { once }) => {
            let config = load_config(&args)?;
            cmd_run(config, once).await
        }
        Some(Command::Scan) | None => {
            let config = load_config(&args)?;
            cmd_scan(config).await
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("bssidcast_service={}", level).parse()?)
                .add_directive(format!("bssidcast_core={}", level).parse()?),
        )
        .init();
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(broker) = &args.broker {
        config.mqtt.broker_uri = broker.clone();
    }
    if let Some(topic) = &args.topic {
        config.mqtt.topic = topic.clone();
    }
    if let Some(interval) = args.interval {
        config.scan.interval_seconds = interval;
    }
    if let Some(provider) = args.provider {
        config.scan.provider = provider;
    }

    config.validate()?;
    Ok(config)
}

fn spawn_scheduler(config: &Config) -> PublishScheduler {
    let kind = config.scan.provider.resolve();
    info!("Using {} scan provider", kind);

    let scan_provider = provider::create(kind, config.scan.interface.clone());
    let client = Arc::new(MqttPublishClient::from_config(&config.mqtt));
    PublishScheduler::spawn(
        scan_provider,
        client,
        config.scheduler_config(kind.source_label()),
    )
}

async fn cmd_scan(config: Config) -> anyhow::Result<()> {
    let scheduler = spawn_scheduler(&config);

    println!("Scanning for WiFi networks...");
    let view = scheduler
        .scan_once()
        .await
        .context("Failed to scan for WiFi networks")?;
    print!("{}", format_display_view(&view));

    scheduler.shutdown().await;
    Ok(())
}

async fn cmd_run(config: Config, once: bool) -> anyhow::Result<()> {
    let scheduler = spawn_scheduler(&config);
    let mut events = scheduler.subscribe();

    scheduler
        .start(config.scan.interval_seconds)
        .await
        .with_context(|| format!("Failed to start publishing to {}", config.mqtt.broker_uri))?;

    if !once {
        println!("Publishing every {}s (Ctrl+C to stop)", config.scan.interval_seconds);
    }

    let mut failure = None;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                println!("\nStopping...");
                break;
            }
            event = events.recv() => match event {
                Ok(SchedulerEvent::StatusChanged { text }) => println!("{}", text),
                Ok(SchedulerEvent::PublishCompleted { error, .. }) if once => {
                    failure = error;
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!("Event listener lagged, missed {} events", n);
                }
                Err(RecvError::Closed) => {
                    info!("Scheduler event stream closed");
                    break;
                }
            }
        }
    }

    if let Err(e) = scheduler.stop().await {
        debug!("Scheduler already stopped: {}", e);
    }
    scheduler.shutdown().await;
    println!("Disconnected");

    if let Some(error) = failure {
        bail!("Publish failed: {}", error);
    }
    Ok(())
}

fn cmd_config_init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(default_config_path);
    if path.exists() && !force {
        bail!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
