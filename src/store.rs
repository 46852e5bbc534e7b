// src/store.rs
//! Ledger storage boundary.
//!
//! The pipeline talks to a [`LedgerStore`] trait so the merge logic never
//! knows where history lives. The shipped implementation keeps two JSON
//! files side by side: the ledger itself and the pre-merge backup written
//! on every run.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::PipelineError;
use crate::report::TicketLedger;

pub const DEFAULT_LEDGER_DIR: &str = "data";
pub const ENV_LEDGER_DIR: &str = "TRACKER_LEDGER_DIR";

const LEDGER_FILE: &str = "ticket_ledger.json";
const BACKUP_FILE: &str = "ticket_ledger.backup.json";

#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Full snapshot of the persisted history. No history yet is an empty
    /// ledger; unreadable or unparseable history is `LedgerRead` and the
    /// caller must not merge against a guess.
    async fn load(&self) -> Result<TicketLedger, PipelineError>;

    /// Persist the pre-merge backup, then the updated ledger.
    async fn store(
        &self,
        updated: &TicketLedger,
        backup: &TicketLedger,
    ) -> Result<(), PipelineError>;
}

/// JSON files under a directory, `TRACKER_LEDGER_DIR` or `data/` by default.
pub struct JsonFileLedgerStore {
    dir: PathBuf,
}

impl JsonFileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var(ENV_LEDGER_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_DIR));
        Self { dir }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    fn write_json(path: &Path, ledger: &TicketLedger) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec_pretty(ledger)
            .map_err(|e| PipelineError::ledger_write(format!("encoding ledger: {e}")))?;
        std::fs::write(path, bytes)
            .map_err(|e| PipelineError::ledger_write(format!("writing {}: {e}", path.display())))
    }
}

#[async_trait::async_trait]
impl LedgerStore for JsonFileLedgerStore {
    async fn load(&self) -> Result<TicketLedger, PipelineError> {
        let path = self.ledger_path();
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TicketLedger::default()),
            Err(e) => {
                return Err(PipelineError::ledger_read(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::ledger_read(format!("parsing {}: {e}", path.display()))
        })
    }

    async fn store(
        &self,
        updated: &TicketLedger,
        backup: &TicketLedger,
    ) -> Result<(), PipelineError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PipelineError::ledger_write(format!("creating {}: {e}", self.dir.display()))
        })?;
        // Backup first. If the ledger write then fails, the pre-merge state
        // is still recoverable.
        Self::write_json(&self.backup_path(), backup)?;
        Self::write_json(&self.ledger_path(), updated)
    }
}

/// In-memory store for tests. `poison_*` flags turn the next calls into the
/// corresponding failures.
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<TicketLedger>,
    backups: Mutex<Vec<TicketLedger>>,
    poison_reads: AtomicBool,
    poison_writes: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: TicketLedger) -> Self {
        let store = Self::default();
        *store.ledger.lock().expect("ledger mutex poisoned") = ledger;
        store
    }

    pub fn poison_reads(&self) {
        self.poison_reads.store(true, Ordering::SeqCst);
    }

    pub fn poison_writes(&self) {
        self.poison_writes.store(true, Ordering::SeqCst);
    }

    pub fn ledger(&self) -> TicketLedger {
        self.ledger.lock().expect("ledger mutex poisoned").clone()
    }

    pub fn backups(&self) -> Vec<TicketLedger> {
        self.backups.lock().expect("backup mutex poisoned").clone()
    }

    pub fn write_count(&self) -> usize {
        self.backups.lock().expect("backup mutex poisoned").len()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self) -> Result<TicketLedger, PipelineError> {
        if self.poison_reads.load(Ordering::SeqCst) {
            return Err(PipelineError::ledger_read("memory store: reads poisoned"));
        }
        Ok(self.ledger())
    }

    async fn store(
        &self,
        updated: &TicketLedger,
        backup: &TicketLedger,
    ) -> Result<(), PipelineError> {
        if self.poison_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::ledger_write("memory store: writes poisoned"));
        }
        self.backups
            .lock()
            .expect("backup mutex poisoned")
            .push(backup.clone());
        *self.ledger.lock().expect("ledger mutex poisoned") = updated.clone();
        Ok(())
    }
}
