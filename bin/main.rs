#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use clap::Parser;
use ron::ser::PrettyConfig;
use switchyard::{
    common::{Address, Envelope, Mail, logging},
    controller::Switchyard,
};

/// Rewrite the recipients of a message and report where it would go
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Rewrite the recipients of a message", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Envelope sender, omit for the null sender
    #[arg(short, long)]
    sender: Option<String>,

    /// Envelope recipient, may be given more than once
    #[arg(short, long = "rcpt", required = true)]
    recipients: Vec<String>,

    /// Message to process, headers and body
    message: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => find_config_file()?,
    };
    let switchyard = Switchyard::from_file(&config_path).await?;

    logging::init();

    let data = tokio::fs::read(&cli.message).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read message from {}: {}",
            cli.message.display(),
            e
        )
    })?;

    let sender = cli.sender.as_deref().map(Address::parse).transpose()?;
    let recipients = cli
        .recipients
        .iter()
        .map(|recipient| Address::parse(recipient))
        .collect::<Result<Vec<_>, _>>()?;

    let mail = Mail::new(Envelope::new(sender, recipients), data);
    let report = switchyard.into_engine().process(mail).await?;

    println!("{}", ron::ser::to_string_pretty(&report, PrettyConfig::default())?);

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `SWITCHYARD_CONFIG` environment variable
/// 2. ./switchyard.config.ron (current working directory)
/// 3. /etc/switchyard/switchyard.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("SWITCHYARD_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "SWITCHYARD_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = vec![
        PathBuf::from("./switchyard.config.ron"),
        PathBuf::from("/etc/switchyard/switchyard.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - SWITCHYARD_CONFIG environment variable\n{paths_tried}"
    )
}
