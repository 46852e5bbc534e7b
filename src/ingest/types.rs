// src/ingest/types.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// One ticket record as extracted from the source system, before any
/// normalization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawTicket {
    pub id: u64,
    pub subject: String,
    pub group: String,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub existing_product: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TicketSource: Send + Sync {
    /// Every ticket created on `day` (UTC). The 24h batch window.
    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<RawTicket>>;
    fn name(&self) -> &'static str;
}

/// In-memory source used by tests and local experiments.
pub struct FixtureTicketSource {
    tickets: Vec<RawTicket>,
}

impl FixtureTicketSource {
    pub fn new(tickets: Vec<RawTicket>) -> Self {
        Self { tickets }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let tickets: Vec<RawTicket> =
            serde_json::from_str(s).context("parsing ticket fixture JSON")?;
        Ok(Self { tickets })
    }
}

#[async_trait::async_trait]
impl TicketSource for FixtureTicketSource {
    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<RawTicket>> {
        Ok(self
            .tickets
            .iter()
            .filter(|t| t.created_at.date_naive() == day)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// File-backed source: reads a JSON array of raw tickets on every fetch, so
/// a fresh export can be dropped in without a restart. A missing file means
/// an empty day; a malformed file is an error.
pub struct JsonFileTicketSource {
    path: std::path::PathBuf,
}

impl JsonFileTicketSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl TicketSource for JsonFileTicketSource {
    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<RawTicket>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "ticket export missing; treating day as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).context(format!("reading {}", self.path.display()));
            }
        };
        let tickets: Vec<RawTicket> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(tickets
            .into_iter()
            .filter(|t| t.created_at.date_naive() == day)
            .collect())
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}
