mod assemble;
mod config;
mod converge;
mod error;
mod netbox;

use std::process::ExitCode;
use anyhow::{Context, Result};
use shared::types::ModuleResult;
use crate::config::ModuleArgs;
use crate::netbox::NetboxClient;

#[tokio::main]
async fn main() -> ExitCode {
    // A .env file may carry NETBOX_URL / NETBOX_TOKEN
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for the result document
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netbox_service=info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match run().await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("{:#}", e);
            ModuleResult::failure(format!("{:#}", e))
        }
    };

    match serde_json::to_string(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::error!("Failed to serialize result: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if result.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run() -> Result<ModuleResult> {
    let args_path = std::env::args()
        .nth(1)
        .context("Usage: netbox-service <args-file>")?;

    let args = ModuleArgs::load(&args_path)
        .with_context(|| format!("Failed to load module arguments from {}", args_path))?;

    tracing::info!("Loaded module arguments from {}", args_path);

    let connection = args.connection()?;
    let client = NetboxClient::new(&connection)?;

    tracing::info!(
        "Converging service {} to {:?} against {}{}",
        args.data.name.as_deref().unwrap_or("<unnamed>"),
        args.state,
        client.base_url(),
        if args.check_mode { " (check mode)" } else { "" }
    );

    let result = converge::converge(&client, args.state, &args.data, args.check_mode).await?;

    tracing::info!("{} (changed: {})", result.msg, result.changed);
    Ok(result)
}
