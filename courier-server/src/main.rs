//! Courier Server - REST API for user accounts and stored emails

use anyhow::Context;
use courier_server::telemetry::{init_tracing, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_FILTER);

    let app = courier_server::create_app().context("failed to bootstrap application")?;
    courier_server::serve(&app, courier_server::shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
