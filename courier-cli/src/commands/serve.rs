//! Serve command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use super::bootstrap;

/// Execute the serve command.
pub async fn execute() -> Result<()> {
    let app = bootstrap()?;
    let settings = app.settings();

    println!(
        "{} {} on http://{} ({} profile)",
        "Serving".green().bold(),
        app.api().title(),
        settings.socket_addr(),
        settings.profile
    );

    courier_server::serve(&app, courier_server::shutdown_signal())
        .await
        .context("Server failed")
}
