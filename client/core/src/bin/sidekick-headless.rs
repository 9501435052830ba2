//! Headless driver: ask one question from the command line and print the
//! streamed answer. Exists for smoke-testing a deployment without an editor.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use sidekick_core::{Assistant, BufferSinkFactory, Polled};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let prompt: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.is_empty() {
        bail!("usage: sidekick-headless <question>");
    }

    let config = sidekick_core::load_config().context("loading config")?;
    let mut assistant = Assistant::connect(config, Box::new(BufferSinkFactory))
        .await
        .context("connecting to service")?;

    assistant.ask(&prompt, None).context("starting exchange")?;

    // A real editor drives poll() from its idle tick; here a sleep loop
    // stands in for it.
    loop {
        match assistant.poll() {
            Some(Polled::ChatClosed {
                cancelled, error, ..
            }) => {
                if let Some(error) = error {
                    assistant.shutdown().await;
                    bail!("exchange failed: {error}");
                }
                if cancelled {
                    tracing::warn!("exchange was cancelled");
                }
                break;
            }
            Some(_) => {}
            None => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }

    match assistant.last_answer() {
        Some(answer) => println!("{answer}"),
        None => tracing::warn!("exchange closed without an answer"),
    }
    assistant.shutdown().await;
    Ok(())
}
