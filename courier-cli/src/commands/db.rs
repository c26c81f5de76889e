//! Migration commands.

use anyhow::{Context, Result};
use colored::Colorize;
use courier_server::MigrationStatus;
use tracing::info;

use super::bootstrap;

/// Apply every pending migration.
pub async fn upgrade() -> Result<()> {
    let app = bootstrap()?;
    let tracker = app.migrations();

    let pending = tracker
        .pending()
        .await
        .context("Failed to read applied migrations")?;
    if pending.is_empty() {
        println!("{}", "Database is up to date.".green());
        return Ok(());
    }

    tracker.upgrade().await.context("Failed to apply migrations")?;

    for migration in &pending {
        info!(version = migration.version, "Applied migration");
        println!(
            "  {} {} {}",
            "applied".green(),
            migration.version,
            migration.description
        );
    }
    println!("{} {} migration(s)", "Upgraded:".green().bold(), pending.len());
    Ok(())
}

/// Revert applied migrations newer than `target`.
pub async fn downgrade(target: i64) -> Result<()> {
    let app = bootstrap()?;
    let tracker = app.migrations();

    let before = tracker
        .applied()
        .await
        .context("Failed to read applied migrations")?;
    tracker
        .downgrade(target)
        .await
        .with_context(|| format!("Failed to downgrade to {target}"))?;

    let reverted: Vec<i64> = before.into_iter().filter(|v| *v > target).collect();
    if reverted.is_empty() {
        println!("Nothing newer than {target} is applied.");
    } else {
        for version in &reverted {
            println!("  {} {}", "reverted".yellow(), version);
        }
    }
    Ok(())
}

/// Show the newest applied migration.
pub async fn current() -> Result<()> {
    let app = bootstrap()?;
    let current = app
        .migrations()
        .current()
        .await
        .context("Failed to read applied migrations")?;

    match current {
        Some(version) => {
            let description = app
                .migrations()
                .history()
                .into_iter()
                .find(|m| m.version == version)
                .map(|m| m.description)
                .unwrap_or_else(|| "(unknown to this build)".to_string());
            println!("{version} {description}");
        }
        None => println!("{}", "No migrations applied.".dimmed()),
    }
    Ok(())
}

/// List known migrations and whether each is applied.
pub async fn history() -> Result<()> {
    let app = bootstrap()?;
    let status = app
        .migrations()
        .status()
        .await
        .context("Failed to read applied migrations")?;

    for line in status.iter().map(format_status) {
        println!("{line}");
    }
    Ok(())
}

fn format_status(status: &MigrationStatus) -> String {
    let marker = if status.applied {
        "[x]".green().to_string()
    } else {
        "[ ]".normal().to_string()
    };
    let reversible = if status.migration.reversible {
        ""
    } else {
        " (irreversible)"
    };
    format!(
        "{marker} {} {}{reversible}",
        status.migration.version, status.migration.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_server::MigrationInfo;

    #[test]
    fn test_format_status() {
        colored::control::set_override(false);
        let status = MigrationStatus {
            migration: MigrationInfo {
                version: 20240601120000,
                description: "create users".to_string(),
                reversible: true,
            },
            applied: true,
        };
        assert_eq!(format_status(&status), "[x] 20240601120000 create users");

        let status = MigrationStatus {
            migration: MigrationInfo {
                version: 2,
                description: "seed".to_string(),
                reversible: false,
            },
            applied: false,
        };
        assert_eq!(format_status(&status), "[ ] 2 seed (irreversible)");
    }
}
