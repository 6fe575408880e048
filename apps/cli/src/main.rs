use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pongo_core::{Client, ClientConfig};
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(author, version, about = "pongoOS USB console client", long_about = None)]
struct Args {
    /// Command to send
    #[arg(short, long, required_unless_present = "upload")]
    command: Option<String>,

    /// File to upload before the command is sent
    #[arg(short, long)]
    upload: Option<PathBuf>,

    /// Path to a TOML client configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-transfer timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(ms) = args.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be non-zero");
        config.transfer_timeout_ms = ms;
    }
    Ok(config)
}

fn run(args: &Args, client: Client<pongo_core::NusbDevice>) -> Result<()> {
    if let Some(path) = &args.upload {
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        println!("Uploading {} ({} bytes)", path.display(), data.len());
        client.send_data(&data).context("Upload failed")?;
    }

    if let Some(command) = &args.command {
        println!("Sending command: {}", command);
        let output = client.send_command(command).context("Command failed")?;
        println!("Output:\n{}", output.as_deref().unwrap_or("(no output)"));
    }

    client.close().context("Failed to release device")?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::WARN.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    debug!(?config, "Client configuration");

    println!("Attempting to connect to device");
    let client = match Client::init(config) {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "Connection failed");
            println!("[ERROR] Failed to connect to device. Exiting.");
            std::process::exit(1);
        }
    };

    if let Some(backend) = client.backend() {
        debug!(%backend, "Connected");
    }

    if let Err(e) = run(&args, client) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
