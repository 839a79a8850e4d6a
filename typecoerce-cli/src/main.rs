//! # typecoerce
//!
//! Command-line entry point for the typecoerce engine.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use typecoerce_cli::{run, CliArgs, Invocation};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize tracing
    let json_logs = args.log_json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "typecoerce_cli=info,typecoerce_core=warn".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
    let pretty = args.pretty;

    let invocation = Invocation::from_args(&args)?;
    tracing::debug!(
        "Registry holds {} types, mode {:?}",
        invocation.registry.len(),
        invocation.mode
    );

    let output = run(invocation)?;
    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");

    Ok(())
}
