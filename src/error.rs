// src/error.rs
//! Error kinds for the classification/report pipeline.
//!
//! The split mirrors how failures propagate: configuration and ledger-read
//! problems abort the run before anything is written, per-ticket validation
//! problems are skipped and counted, and ledger-write problems leave the
//! caller free to retry with the already-computed values.

use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or missing rule/lookup configuration. Raised at load time,
    /// before any ticket is touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single ticket failed a structural invariant. The ticket is skipped
    /// and counted; the run continues.
    #[error("ticket validation error: {0}")]
    Validation(String),

    /// The upstream ticket source failed while fetching the batch window.
    #[error("ticket source error: {0}")]
    Source(String),

    /// Prior report history could not be fetched or parsed. The merge must
    /// not run against a guessed baseline, so this aborts the run.
    #[error("ledger read error: {0}")]
    LedgerRead(String),

    /// The updated ledger or its backup could not be persisted. All values
    /// were computed before the first write, so a retry is safe.
    #[error("ledger write error: {0}")]
    LedgerWrite(String),
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn ledger_read(msg: impl Into<String>) -> Self {
        Self::LedgerRead(msg.into())
    }

    pub fn ledger_write(msg: impl Into<String>) -> Self {
        Self::LedgerWrite(msg.into())
    }

    /// True for kinds that abort the whole run. `Validation` is the only
    /// local kind; it never escapes the normalization stage.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
