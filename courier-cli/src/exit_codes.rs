//! Exit codes following sysexits.h conventions.
//!
//! Scripts and deploy hooks can tell a bad configuration apart from an
//! unreachable database.

use courier_server::db::is_connection_error;
use courier_server::migrate::MigrateError;
use courier_server::BootstrapError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Migration data error (unknown, dirty or modified migration).
/// Maps to EX_DATAERR from sysexits.h.
pub const MIGRATION_ERROR: i32 = 65;

/// Database unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const DATABASE_UNAVAILABLE: i32 = 69;

/// Cannot bind or serve the listener.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Bad profile, setting or database URL.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(e) = cause.downcast_ref::<BootstrapError>() {
                    Some(bootstrap_code(e))
                } else {
                    cause.downcast_ref::<MigrateError>().map(migrate_code)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(format!("{err:#}")),
        }
    }
}

fn bootstrap_code(err: &BootstrapError) -> i32 {
    match err {
        BootstrapError::UnknownProfile(_)
        | BootstrapError::Config(_)
        | BootstrapError::DuplicateGroup(_)
        | BootstrapError::Database(_) => CONFIG_ERROR,
        BootstrapError::Io(_) => IO_ERROR,
    }
}

fn migrate_code(err: &MigrateError) -> i32 {
    match err {
        MigrateError::Execute(e) if is_connection_error(e) => DATABASE_UNAVAILABLE,
        _ => MIGRATION_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_bootstrap_errors_map_to_config() {
        let err = anyhow::Error::new(BootstrapError::UnknownProfile("staging".into()))
            .context("Failed to bootstrap application");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, CONFIG_ERROR);
        assert!(exit.message.unwrap().contains("staging"));
    }

    #[test]
    fn test_io_error_maps_to_io() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = anyhow::Error::new(BootstrapError::Io(io));
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);
    }

    #[test]
    fn test_migration_errors() {
        let err: anyhow::Result<()> = Err(MigrateError::VersionMissing(3)).context("upgrade");
        assert_eq!(ExitCode::from_anyhow(&err.unwrap_err()).code, MIGRATION_ERROR);
    }

    #[test]
    fn test_execute_errors_split_by_cause() {
        let unreachable = anyhow::Error::new(MigrateError::Execute(sqlx::Error::PoolTimedOut));
        assert_eq!(ExitCode::from_anyhow(&unreachable).code, DATABASE_UNAVAILABLE);

        let failed_statement = anyhow::Error::new(MigrateError::Execute(sqlx::Error::RowNotFound));
        assert_eq!(ExitCode::from_anyhow(&failed_statement).code, MIGRATION_ERROR);
    }

    #[test]
    fn test_unknown_error_is_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
        assert_eq!(ExitCode::success().code, SUCCESS);
    }
}
