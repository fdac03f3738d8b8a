use serde::Deserialize;
use std::{fs, io, path::Path, time::Duration};

use crate::errors::ReceiptError;

pub const DEFAULT_CONFIG_PATH: &str = ".config/receipt_ingest.toml";
pub const CONFIG_ENV_VAR: &str = "RECEIPT_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub ocr: OcrSection,
}

fn default_db_path() -> String {
    "receipts/receipts.db".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrSection {
    #[serde(default = "default_ocr_url")]
    pub base_url: String,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
}

fn default_ocr_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ocr_timeout() -> u64 {
    5
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            base_url: default_ocr_url(),
            timeout_secs: default_ocr_timeout(),
        }
    }
}

impl OcrSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_filter: default_log_filter(),
            ocr: OcrSection::default(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file means all defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReceiptError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content)
    }

    /// `$RECEIPT_CONFIG` if set, else the default location.
    pub fn load_default() -> Result<Self, ReceiptError> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    pub fn parse(content: &str) -> Result<Self, ReceiptError> {
        let cfg: Self = toml::from_str(content)?;
        if cfg.ocr.timeout_secs == 0 {
            return Err(ReceiptError::Config(
                "ocr.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }
}
