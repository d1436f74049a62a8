use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use parley_client::{ChannelConfig, Incoming, SignallingChannel};
use parley_core::utils::{DEFAULT_RELAY_PORT, DEFAULT_RELAY_URL};
use parley_core::{ChannelStatus, SignallingMessage};
use parley_server::{RelayConfig, serve};
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Signalling relay and tooling for two-party calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signalling relay.
    Relay {
        #[arg(long, env = "PARLEY_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,

        #[arg(short, long, env = "PARLEY_PORT", default_value_t = DEFAULT_RELAY_PORT)]
        port: u16,

        /// Refuse clients beyond this many. 0 means no limit.
        #[arg(long, env = "PARLEY_MAX_PEERS", default_value_t = 2)]
        max_peers: usize,
    },
    /// Attach to a relay and print the signalling traffic it fans out.
    Listen {
        #[arg(long, env = "PARLEY_URL", default_value = DEFAULT_RELAY_URL)]
        url: String,
    },
    /// Send a single hangup through a relay.
    Hangup {
        #[arg(long, env = "PARLEY_URL", default_value = DEFAULT_RELAY_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay {
            bind,
            port,
            max_peers,
        } => {
            let config = RelayConfig {
                bind,
                port,
                max_peers: (max_peers > 0).then_some(max_peers),
            };
            serve(config, shutdown_signal()).await
        }
        Commands::Listen { url } => listen(url).await,
        Commands::Hangup { url } => hangup(url).await,
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}

async fn listen(url: String) -> Result<()> {
    println!("{} {}", "Listening on".green().bold(), url);

    let (channel, mut incoming) = SignallingChannel::connect(ChannelConfig::new(url));
    let mut status = channel.watch_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                print_status(current);
            }
            frame = incoming.recv() => match frame {
                Some(frame) => print_incoming(&frame),
                None => break,
            },
        }
    }

    channel.close();
    Ok(())
}

async fn hangup(url: String) -> Result<()> {
    let (channel, _incoming) = SignallingChannel::connect(ChannelConfig {
        max_attempts: Some(3),
        ..ChannelConfig::new(url.clone())
    });

    if !channel.wait_until_open(Duration::from_secs(5)).await {
        bail!("Could not reach relay at {}", url);
    }
    channel.send_signal(&SignallingMessage::Hangup)?;
    println!("{}", "Hangup sent".green());

    // Let the frame leave before the close frame follows it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.close();
    Ok(())
}

fn print_status(status: ChannelStatus) {
    let label = status.to_string();
    let label = match status {
        ChannelStatus::Open => label.green(),
        ChannelStatus::Connecting => label.yellow(),
        ChannelStatus::Closed => label.red(),
    };
    println!("{} {}", "channel".dimmed(), label);
}

fn print_incoming(frame: &Incoming) {
    match frame {
        Incoming::Signal(msg) => {
            let kind = msg.kind().to_string();
            let kind = match msg {
                SignallingMessage::Offer(_) => kind.cyan().bold(),
                SignallingMessage::Answer(_) => kind.blue().bold(),
                SignallingMessage::IceCandidate(_) => kind.magenta(),
                SignallingMessage::Hangup => kind.red().bold(),
            };
            let body = msg.encode().unwrap_or_default();
            println!("{} {}", kind, body.dimmed());
        }
        Incoming::Binary(data) => {
            println!("{} {} bytes", "binary".yellow(), data.len());
        }
    }
}
