//! Routes command implementation.

use anyhow::Result;
use colored::Colorize;
use courier_server::api::{OPENAPI_PATH, SWAGGER_UI_PATH};

use super::bootstrap;

/// Execute the routes command.
pub fn execute() -> Result<()> {
    let app = bootstrap()?;

    for group in app.api().groups() {
        println!("{} - {}", group.name().bold(), group.description());
        for (method, path) in group.routes() {
            println!("  {method:<7} {path}");
        }
    }

    println!("{}", "built-in".bold());
    for (method, path) in [
        ("GET", "/health"),
        ("GET", "/ready"),
        ("GET", OPENAPI_PATH),
        ("GET", SWAGGER_UI_PATH),
    ] {
        println!("  {method:<7} {path}");
    }
    Ok(())
}
