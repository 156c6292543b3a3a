use std::path::PathBuf;

use bizsuite_core::migration::validator::MAX_VALIDATION_ERRORS;

/// Tunables for the migration pipeline loaded from environment variables.
///
/// Every field has a default suitable for local development.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Directory holding uploaded source files.
    pub upload_dir: PathBuf,
    /// Rows per execute commit.
    pub batch_size: usize,
    /// Rows kept on the job as `sample_data`.
    pub sample_size: usize,
    /// Validation stops after this many errors.
    pub max_errors: usize,
    /// Largest accepted upload.
    pub max_upload_bytes: usize,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads/migrations"),
            batch_size: 500,
            sample_size: 10,
            max_errors: MAX_VALIDATION_ERRORS,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl MigrationSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                      | Default              |
    /// |------------------------------|----------------------|
    /// | `MIGRATION_UPLOAD_DIR`       | `uploads/migrations` |
    /// | `MIGRATION_BATCH_SIZE`       | `500`                |
    /// | `MIGRATION_SAMPLE_SIZE`      | `10`                 |
    /// | `MIGRATION_MAX_ERRORS`       | `100`                |
    /// | `MIGRATION_MAX_UPLOAD_BYTES` | `52428800`           |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let upload_dir = std::env::var("MIGRATION_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        Self {
            upload_dir,
            batch_size: env_usize("MIGRATION_BATCH_SIZE", defaults.batch_size),
            sample_size: env_usize("MIGRATION_SAMPLE_SIZE", defaults.sample_size),
            max_errors: env_usize("MIGRATION_MAX_ERRORS", defaults.max_errors),
            max_upload_bytes: env_usize("MIGRATION_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }
}

/// Positive integer from the environment; unset, unparsable or zero values
/// fall back to `default` with a warning for the latter two.
fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Err(_) => default,
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!(var = name, value = %raw, default, "Invalid setting, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = MigrationSettings::default();
        assert_eq!(settings.batch_size, 500);
        assert_eq!(settings.sample_size, 10);
        assert_eq!(settings.max_errors, 100);
        assert_eq!(settings.max_upload_bytes, 52_428_800);
        assert_eq!(settings.upload_dir, PathBuf::from("uploads/migrations"));
    }

    #[test]
    fn unset_variable_uses_default() {
        assert_eq!(env_usize("BIZSUITE_TEST_UNSET_VARIABLE", 7), 7);
    }
}
