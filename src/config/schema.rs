/// Configuration schema and defaults for ccdash.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[api]`, `[table]`, `[dashboard]` and `[logging]`.
///
/// Every field has a sensible built-in default. Users only need to set the
/// values they want to override.
use serde::{Deserialize, Serialize};

use crate::api::types::DEFAULT_PAGE_SIZE;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level ccdash configuration.
///
/// Maps directly to the `~/.ccdash/config.toml` and `.ccdash.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub table: TableConfig,
    pub dashboard: DashboardSettings,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [api]
// ---------------------------------------------------------------------------

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the analytics backend.
    pub base_url: String,
    /// Socket timeout per request (milliseconds). `0` disables it.
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [table]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Rows per page for the monthly features table (1-200).
    pub page_size: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Features listed in the "top drivers" summary.
    pub summary_count: usize,
    /// Features drawn in the importance chart.
    pub chart_count: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            summary_count: 3,
            chart_count: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Request log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether every backend exchange is appended to the request log.
    pub enabled: bool,
    /// Path to the JSONL request log. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.ccdash/request-log.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl DashboardConfig {
    /// The annotated config written by `ccdash config init`.
    pub fn default_toml() -> &'static str {
        r#"# ccdash configuration
# Precedence: built-in defaults < ~/.ccdash/config.toml < .ccdash.toml < CCDASH_* env vars

[api]
# Base URL of the analytics backend (CCDASH_API_URL)
base_url = "http://localhost:5000"
# Socket timeout per request in milliseconds, 0 disables (CCDASH_TIMEOUT_MS)
timeout_ms = 30000

[table]
# Rows per page for the monthly features table, 1-200 (CCDASH_PAGE_SIZE)
page_size = 50

[dashboard]
# Features listed in the top-drivers summary
summary_count = 3
# Features drawn in the importance chart
chart_count = 10

[logging]
# Append every backend exchange to a JSONL request log (CCDASH_LOGGING)
enabled = true
path = "~/.ccdash/request-log.jsonl"
"#
    }
}
