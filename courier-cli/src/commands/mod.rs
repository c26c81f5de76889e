//! Subcommand implementations.

pub mod db;
pub mod routes;
pub mod serve;

use anyhow::{Context, Result};
use courier_server::Application;

/// Build the application exactly as the server binary does
pub fn bootstrap() -> Result<Application> {
    courier_server::create_app().context("Failed to bootstrap application")
}
