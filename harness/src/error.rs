use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can stop plan construction or the whole run.
///
/// Stage failures and timeouts are per-job outcomes, not errors; they are
/// recorded in [`crate::JobStatus`] and never abort the batch.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A required path or setting is missing; fatal before any job starts.
    #[error("invalid configuration: {reason}: {path}")]
    ConfigurationInvalid { reason: String, path: Utf8PathBuf },

    /// A descriptor requested an ISA feature the builder cannot encode.
    /// Fails that one job's plan, not the batch.
    #[error("unsupported ISA extension '{0}'")]
    UnsupportedExtension(String),
}

impl HarnessError {
    pub fn invalid_config(reason: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self::ConfigurationInvalid {
            reason: reason.into(),
            path: path.into(),
        }
    }
}
