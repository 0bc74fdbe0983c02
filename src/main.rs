//! Bridgewire - typed value exchange between two runtimes
//!
//! Command line front end: run a conformance echo server, send single values,
//! and encode/decode message streams.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bridgewire::config::{self, Config};
use bridgewire::network::{Client, EchoHandler, Server, ServerEvent};
use bridgewire::protocol::{Codec, Message, PROTOCOL_VERSION};

/// Bridgewire - cross-runtime value exchange
#[derive(Parser)]
#[command(name = "bridgewire")]
#[command(author = "Bridgewire Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Exchange typed values with another runtime over a socket", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an echo server that reflects every message back
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Send one value and print the reply
    Send {
        /// Server host name or address
        #[arg(short, long, default_value = "127.0.0.1")]
        server: String,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Kind of value to send
        #[arg(short, long, value_enum, default_value_t = ValueKind::Null)]
        kind: ValueKind,

        /// The value, parsed according to the kind
        #[arg(long)]
        value: Option<String>,
    },

    /// Encode one value
    Encode {
        /// Kind of value to encode
        #[arg(short, long, value_enum, default_value_t = ValueKind::Null)]
        kind: ValueKind,

        /// The value, parsed according to the kind
        #[arg(long)]
        value: Option<String>,

        /// Write raw bytes here instead of hex to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode every message in a file
    Decode {
        /// File holding consecutive encoded messages
        file: PathBuf,

        /// Print messages as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered message types
    Tags,

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Value kinds that can be given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValueKind {
    Null,
    Bool,
    Byte,
    Int32,
    Int64,
    Float64,
    String,
}

/// Build a message from a command line kind and value
fn build_message(kind: ValueKind, value: Option<&str>) -> anyhow::Result<Message> {
    if kind == ValueKind::Null {
        if value.is_some() {
            anyhow::bail!("null takes no value");
        }
        return Ok(Message::null());
    }

    let raw = value.with_context(|| format!("--value is required for {:?}", kind))?;
    let message = match kind {
        ValueKind::Null => Message::null(),
        ValueKind::Bool => Message::from(raw.parse::<bool>()?),
        ValueKind::Byte => Message::from(raw.parse::<u8>()?),
        ValueKind::Int32 => Message::from(raw.parse::<i32>()?),
        ValueKind::Int64 => Message::from(raw.parse::<i64>()?),
        ValueKind::Float64 => Message::from(raw.parse::<f64>()?),
        ValueKind::String => Message::from(raw),
    };
    Ok(message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = match &config.general.log_filter {
        Some(directive) if !cli.verbose => EnvFilter::new(directive),
        _ if cli.verbose || config.general.verbose => EnvFilter::new("debug"),
        _ => EnvFilter::new("info"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let codec = config.wire.codec();

    match cli.command {
        Commands::Serve { port, bind } => {
            run_server(config, codec, port, bind).await?;
        }
        Commands::Send {
            server,
            port,
            kind,
            value,
        } => {
            let message = build_message(kind, value.as_deref())?;
            run_send(config, codec, &server, port, message).await?;
        }
        Commands::Encode {
            kind,
            value,
            output,
        } => {
            let message = build_message(kind, value.as_deref())?;
            let bytes = codec.encode_to_vec(&message)?;
            if let Some(path) = output {
                std::fs::write(&path, &bytes)?;
                println!("{} bytes written to: {}", bytes.len(), path.display());
            } else {
                println!("{}", hex::encode(&bytes));
            }
        }
        Commands::Decode { file, json } => {
            run_decode(&codec, &file, json)?;
        }
        Commands::Tags => {
            println!(
                "Protocol version {}, magic {:#06x}",
                PROTOCOL_VERSION,
                codec.magic()
            );
            for entry in codec.registry().entries() {
                println!("{:>5}  {}", entry.tag, entry.name);
            }
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Run the echo server until ctrl-c
async fn run_server(
    mut config: Config,
    codec: Codec,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.network.port = port;
    }
    if let Some(bind) = bind {
        config.network.bind_address = bind;
    }

    let mut server = Server::new(config.network.clone(), codec, EchoHandler);
    let mut event_rx = server
        .take_event_receiver()
        .context("event receiver already taken")?;

    let bind_addr = server.start().await?;
    tracing::info!("Echo server ready on {}", bind_addr);
    println!("Listening on {} (Ctrl+C to stop)", bind_addr);

    // Main event loop
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ServerEvent::ClientConnected { id, addr } => {
                        println!("+ {} connected ({})", addr, id);
                    }
                    ServerEvent::ClientDisconnected { id, addr, reason } => {
                        println!("- {} disconnected ({}): {}", addr, id, reason);
                    }
                    ServerEvent::MessageReceived { id, type_tag, type_name } => {
                        tracing::debug!(%id, "Echoing {} (tag {})", type_name, type_tag);
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await?;
    tracing::info!("Server stopped");

    Ok(())
}

/// Send one message and print the reply
async fn run_send(
    config: Config,
    codec: Codec,
    server: &str,
    port: Option<u16>,
    message: Message,
) -> anyhow::Result<()> {
    let mut network = config.network;
    if let Some(port) = port {
        network.port = port;
    }

    let mut client = Client::new(network, codec);
    client.connect_host(server).await?;

    let reply = client.request(&message).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    client.disconnect().await?;
    Ok(())
}

/// Decode consecutive messages from a file
fn run_decode(codec: &Codec, path: &Path, json: bool) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut offset = 0;
    let mut index = 0;
    while offset < bytes.len() {
        let (message, consumed) = codec
            .decode_slice(&bytes[offset..])
            .with_context(|| format!("message {} at byte offset {}", index, offset))?;

        if json {
            println!("{}", serde_json::to_string(&message)?);
        } else {
            println!(
                "[{}] @{} {} (tag {}): {:?}",
                index,
                offset,
                message.type_name(),
                message.type_tag(),
                message
            );
        }

        offset += consumed;
        index += 1;
    }

    tracing::info!("Decoded {} messages ({} bytes)", index, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_message() {
        assert!(build_message(ValueKind::Null, None).unwrap().is_null());
        assert_eq!(
            build_message(ValueKind::Int32, Some("42")).unwrap(),
            Message::from(42)
        );
        assert_eq!(
            build_message(ValueKind::String, Some("hi")).unwrap(),
            Message::from("hi")
        );
        assert!(build_message(ValueKind::Byte, Some("300")).is_err());
        assert!(build_message(ValueKind::Int64, None).is_err());
        assert!(build_message(ValueKind::Null, Some("x")).is_err());
    }

    #[test]
    fn test_decode_file() {
        let codec = Codec::new();
        let mut file = NamedTempFile::new().unwrap();
        for message in [Message::null(), Message::from(42), Message::null()] {
            file.write_all(&codec.encode_to_vec(&message).unwrap()).unwrap();
        }
        file.flush().unwrap();

        assert!(run_decode(&codec, file.path(), false).is_ok());
    }

    #[test]
    fn test_decode_file_with_trailing_garbage() {
        let codec = Codec::new();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&codec.encode_to_vec(&Message::null()).unwrap())
            .unwrap();
        file.write_all(&[0x01]).unwrap();
        file.flush().unwrap();

        assert!(run_decode(&codec, file.path(), true).is_err());
    }
}
