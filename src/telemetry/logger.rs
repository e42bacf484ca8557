use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{ApiError, HttpRequest};

// ---------------------------------------------------------------------------
// Request log entry (JSONL)
// ---------------------------------------------------------------------------

/// How an HTTP exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Ok,
    HttpError,
    NetworkError,
    PayloadError,
    Cancelled,
}

impl RequestOutcome {
    pub fn from_result(result: &Result<Value, ApiError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(ApiError::Http { .. }) => Self::HttpError,
            Err(ApiError::Network { .. }) => Self::NetworkError,
            Err(ApiError::Payload { .. }) => Self::PayloadError,
            Err(ApiError::Cancelled) => Self::Cancelled,
        }
    }
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Ok => "ok",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::PayloadError => "payload_error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A single entry in the request log (`~/.ccdash/request-log.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    /// Query string parameters, when any were sent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    /// HTTP status, absent when no response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub outcome: RequestOutcome,
    /// Normalized error message for failed exchanges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only JSONL request log. All writes are best-effort.
#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a finished exchange. I/O failures are ignored so logging can
    /// never break a dashboard load.
    pub fn record(
        &self,
        request: &HttpRequest,
        status: Option<u16>,
        elapsed: Duration,
        outcome: RequestOutcome,
        result: &Result<Value, ApiError>,
    ) {
        let entry = RequestLogEntry {
            timestamp: Utc::now(),
            method: request.method.to_string(),
            path: request.path.clone(),
            query: request.query.clone(),
            status,
            latency_ms: elapsed.as_millis() as u64,
            outcome,
            message: result.as_ref().err().map(|e| e.to_string()),
        };
        let _ = self.append(&entry);
    }

    pub fn append(&self, entry: &RequestLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;

        Ok(())
    }

    /// Read every entry, silently skipping malformed lines. Returns an empty
    /// vec if the file does not exist or cannot be read.
    pub fn read_all(&self) -> Vec<RequestLogEntry> {
        let Ok(file) = fs::File::open(&self.path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(std::result::Result::ok)
            .filter_map(|line| serde_json::from_str::<RequestLogEntry>(&line).ok())
            .collect()
    }

    /// The last `limit` entries, oldest first.
    pub fn read_recent(&self, limit: usize) -> Vec<RequestLogEntry> {
        let mut entries = self.read_all();
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        entries
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
