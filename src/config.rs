// src/config.rs
//! Service-level settings from the environment. Rule configuration is not
//! here; the classifier loads its own TOML (see `classify`).

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::classify::{DEFAULT_CLASSIFIER_CONFIG_PATH, ENV_CLASSIFIER_CONFIG_PATH};
use crate::store::{DEFAULT_LEDGER_DIR, ENV_LEDGER_DIR};

pub const ENV_BIND_ADDR: &str = "TRACKER_BIND_ADDR";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:10000";

pub const ENV_TICKET_EXPORT_PATH: &str = "TRACKER_TICKET_EXPORT";
pub const DEFAULT_TICKET_EXPORT_PATH: &str = "data/tickets.json";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub classifier_config_path: PathBuf,
    pub ledger_dir: PathBuf,
    pub ticket_export_path: PathBuf,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_raw =
            std::env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {ENV_BIND_ADDR} `{bind_raw}`: {e}"))?;

        let classifier_config_path = std::env::var(ENV_CLASSIFIER_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLASSIFIER_CONFIG_PATH));

        let ledger_dir = std::env::var(ENV_LEDGER_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_DIR));

        let ticket_export_path = std::env::var(ENV_TICKET_EXPORT_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TICKET_EXPORT_PATH));

        Ok(Self {
            bind_addr,
            classifier_config_path,
            ledger_dir,
            ticket_export_path,
        })
    }
}
