/// Configuration system for ccdash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::DashboardConfig::default()`]
/// 2. **User global config**: `~/.ccdash/config.toml`
/// 3. **Project local config**: `.ccdash.toml` in the current working directory
/// 4. **Environment variables**: `CCDASH_*` overrides (highest precedence)
///
/// Layers are merged key by key: a file that only sets `table.page_size`
/// leaves every other value from the previous layer untouched.
///
/// # Usage
///
/// ```rust,ignore
/// use ccdash::config;
///
/// let cfg = config::load();
/// let api = ccdash::api::DashboardApi::from_config(&cfg);
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::api::types::MAX_PAGE_SIZE;

pub use schema::{ApiConfig, DashboardConfig, DashboardSettings, LoggingConfig, TableConfig};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges defaults → global TOML → project TOML → env vars. Malformed files
/// are ignored so a bad config never prevents the dashboard from starting.
pub fn load() -> DashboardConfig {
    let layers: Vec<PathBuf> = [global_config_path(), project_config_path()]
        .into_iter()
        .flatten()
        .collect();

    let mut config = load_layers(&layers);
    apply_env_overrides(&mut config);
    config.sanitize();
    config
}

/// Merge the given TOML files over the built-in defaults, in order.
pub fn load_layers(paths: &[PathBuf]) -> DashboardConfig {
    let Ok(mut merged) = toml::Value::try_from(DashboardConfig::default()) else {
        return DashboardConfig::default();
    };

    for path in paths {
        if let Some(overlay) = read_toml_value(path) {
            merge_value(&mut merged, overlay);
        }
    }

    merged.try_into().unwrap_or_default()
}

fn read_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key; any
/// other value replaces the base value.
fn merge_value(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl DashboardConfig {
    /// Clamp values into the ranges the backend and views accept.
    pub fn sanitize(&mut self) {
        self.table.page_size = self.table.page_size.clamp(1, MAX_PAGE_SIZE);
        self.dashboard.summary_count = self.dashboard.summary_count.max(1);
        self.dashboard.chart_count = self.dashboard.chart_count.max(1);
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.ccdash/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ccdash").join("config.toml"))
}

/// Path to the project local config: `.ccdash.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".ccdash.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `CCDASH_API_URL`: backend base URL
/// - `CCDASH_TIMEOUT_MS`: socket timeout per request
/// - `CCDASH_PAGE_SIZE`: monthly table page size
/// - `CCDASH_LOGGING`: request log on/off (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut DashboardConfig) {
    if let Ok(val) = std::env::var("CCDASH_API_URL")
        && !val.trim().is_empty()
    {
        config.api.base_url = val.trim().to_string();
    }
    if let Ok(val) = std::env::var("CCDASH_TIMEOUT_MS")
        && let Ok(ms) = val.trim().parse::<u64>()
    {
        config.api.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("CCDASH_PAGE_SIZE")
        && let Ok(size) = val.trim().parse::<u32>()
    {
        config.table.page_size = size;
    }
    if let Ok(val) = std::env::var("CCDASH_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.ccdash/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    write_default_config(&path, force)?;
    Ok(path)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }

    fs::write(path, DashboardConfig::default_toml()).context("failed to write config file")?;
    Ok(())
}

/// Set a single config key in the global config file.
///
/// Supports dotted keys like `api.base_url`. The value is parsed according to
/// the type of the existing (or default) value at that key.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_at(&path, key, value)
}

fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(DashboardConfig::default())
            .context("failed to serialize default config")?
    };

    set_toml_value(&mut root, key, value)?;

    // Reject values that would no longer deserialize into the schema.
    let _: DashboardConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}'"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// Unknown sections are an error. A key missing from an existing section
/// falls back to the built-in schema to decide the value type.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("config key must look like 'section.key', got '{key}'");
    }

    let defaults =
        toml::Value::try_from(DashboardConfig::default()).context("failed to serialize defaults")?;
    let template = parts
        .iter()
        .try_fold(&defaults, |node, part| node.get(part))
        .with_context(|| format!("unknown config key: '{key}'"))?;

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table above '{part}' in '{key}'"))?;
        current = table
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    let leaf = parts[parts.len() - 1];
    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{key}'"))?;

    let new_value = match template {
        toml::Value::Boolean(_) => toml::Value::Boolean(is_truthy(raw_value)),
        toml::Value::Integer(_) => {
            let n: i64 = raw_value
                .trim()
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        toml::Value::Float(_) => {
            let f: f64 = raw_value
                .trim()
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
