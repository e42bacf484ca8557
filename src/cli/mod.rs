//! CLI command implementations for the credit card analytics dashboard.
//!
//! Provides subcommand handlers for:
//! - `ccdash dashboard`: overview stats, top drivers and importance chart
//! - `ccdash features` / `ccdash overview`: one dashboard section each
//! - `ccdash monthly`: one page of the monthly features table
//! - `ccdash browse`: interactive pager over the monthly features table
//! - `ccdash predict`: submit the 15 prediction fields
//! - `ccdash fields`: list the prediction fields
//! - `ccdash health`: backend reachability, config and request log status
//! - `ccdash history`: recent backend requests from the request log
//! - `ccdash config show|init|set|reset`: configuration management

pub mod browse;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use crate::api::DashboardApi;
use crate::api::types::{FeatureImportanceItem, PREDICT_FIELDS};
use crate::config::{self, DashboardConfig};
use crate::telemetry::logger::expand_home;
use crate::telemetry::{RequestLog, RequestLogEntry, RequestOutcome};
use crate::views::dashboard::{
    self, ChartBar, DashboardView, OverviewStat, PredictionForm, PredictionState, Section,
};
use crate::views::format::{format_decimal, truncate};
use crate::views::table::{self, COLUMNS, MonthlyTableView, TableStatus};

/// Output format for analytics commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Width of a full importance bar, in cells.
const BAR_WIDTH: usize = 30;

// ---------------------------------------------------------------------------
// ccdash dashboard
// ---------------------------------------------------------------------------

/// Load both dashboard sections concurrently and print them.
pub fn run_dashboard(config: &DashboardConfig, format: OutputFormat) -> Result<()> {
    let api = DashboardApi::from_config(config);
    let mut view = DashboardView::new(&config.dashboard);
    dashboard::load_dashboard(&mut view, &api);

    match format {
        OutputFormat::Json => print_dashboard_json(&view)?,
        OutputFormat::Csv => print_dashboard_csv(&view),
        OutputFormat::Table => print_dashboard_table(&view, config),
    }
    Ok(())
}

fn print_dashboard_table(view: &DashboardView, config: &DashboardConfig) {
    println!("{}", "Credit Card Spending Dashboard".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {}", config.api.base_url.dimmed());
    println!();

    println!("{}", "Overview".bold().cyan());
    match view.overview() {
        Section::Failed(message) => print_section_error(message),
        _ => print_overview_rows(&view.overview_stats()),
    }
    println!();

    println!("{}", "Top Spending Drivers".bold().cyan());
    match view.features() {
        Section::Failed(message) => print_section_error(message),
        _ => {
            for (i, item) in view.summary_features().iter().enumerate() {
                println!(
                    "  {}. {:<32} {}",
                    i + 1,
                    item.name.bold(),
                    format_decimal(item.importance, 4)
                );
            }
        }
    }
    println!();

    println!("{}", "Feature Importance".bold().cyan());
    if view.features().ready().is_some() {
        print_chart(&view.chart_data());
    }
}

fn print_dashboard_json(view: &DashboardView) -> Result<()> {
    let value = serde_json::json!({
        "overview": section_json(view.overview(), || serde_json::to_value(view.overview_stats())),
        "top_features": section_json(view.features(), || serde_json::to_value(view.summary_features())),
        "chart": section_json(view.features(), || serde_json::to_value(view.chart_data())),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn section_json<T>(
    section: &Section<T>,
    ready: impl FnOnce() -> serde_json::Result<Value>,
) -> Value {
    match section {
        Section::Failed(message) => serde_json::json!({ "error": message }),
        Section::Loading => Value::Null,
        Section::Ready(_) => ready().unwrap_or(Value::Null),
    }
}

fn print_dashboard_csv(view: &DashboardView) {
    println!("section,key,value");
    if let Some(message) = view.overview().error() {
        println!("overview,error,{}", csv_field(message));
    }
    for stat in view.overview_stats() {
        println!("overview,{},{}", stat.key, csv_field(&stat.value));
    }
    if let Some(message) = view.features().error() {
        println!("feature_importance,error,{}", csv_field(message));
    }
    for bar in view.chart_data() {
        println!("feature_importance,{},{}", csv_field(&bar.name), bar.importance);
    }
}

// ---------------------------------------------------------------------------
// ccdash features
// ---------------------------------------------------------------------------

/// Print the feature-importance ranking.
pub fn run_features(
    config: &DashboardConfig,
    format: OutputFormat,
    limit: Option<usize>,
) -> Result<()> {
    let api = DashboardApi::from_config(config);
    let mut items = api.fetch_feature_importance()?;
    if let Some(limit) = limit {
        items.truncate(limit);
    }

    if items.is_empty() {
        println!("{}", "The backend reported no feature importances.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Csv => print_features_csv(&items),
        OutputFormat::Table => {
            println!("{}", "Feature Importance".bold().cyan());
            println!("{}", "=".repeat(60));
            // Chart every returned item, not just the configured top N.
            let mut settings = config.dashboard.clone();
            settings.chart_count = items.len();
            let mut view = DashboardView::new(&settings);
            view.apply_features(Ok(items));
            print_chart(&view.chart_data());
        }
    }
    Ok(())
}

fn print_features_csv(items: &[FeatureImportanceItem]) {
    println!("rank,feature,importance");
    for (i, item) in items.iter().enumerate() {
        println!("{},{},{}", i + 1, csv_field(&item.name), item.importance);
    }
}

// ---------------------------------------------------------------------------
// ccdash overview
// ---------------------------------------------------------------------------

/// Print the aggregate dataset statistics.
pub fn run_overview(config: &DashboardConfig, format: OutputFormat) -> Result<()> {
    let api = DashboardApi::from_config(config);
    let metrics = api.fetch_overview()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metrics)?),
        OutputFormat::Csv | OutputFormat::Table => {
            let mut view = DashboardView::new(&config.dashboard);
            view.apply_overview(Ok(metrics));
            let stats = view.overview_stats();
            if format == OutputFormat::Csv {
                println!("key,label,value");
                for stat in &stats {
                    println!("{},{},{}", stat.key, stat.label, csv_field(&stat.value));
                }
            } else {
                println!("{}", "Overview".bold().cyan());
                println!("{}", "=".repeat(40));
                print_overview_rows(&stats);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ccdash monthly
// ---------------------------------------------------------------------------

/// Table page selection shared by `monthly` and `browse`.
#[derive(Debug, Clone, Default)]
pub struct MonthlyArgs {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub customer: Option<String>,
    pub year_month: Option<String>,
}

/// Fetch and print one page of monthly features.
pub fn run_monthly(config: &DashboardConfig, args: &MonthlyArgs, format: OutputFormat) -> Result<()> {
    let mut view = MonthlyTableView::new(config.table.page_size);
    if let Some(size) = args.page_size {
        view.set_page_size(size).map_err(anyhow::Error::msg)?;
    }
    view.set_customer_input(args.customer.as_deref().unwrap_or_default());
    view.set_year_month_input(args.year_month.as_deref().unwrap_or_default());
    view.submit_filters().map_err(anyhow::Error::msg)?;
    if let Some(page) = args.page {
        view.go_to_page(page);
    }

    let api = DashboardApi::from_config(config);
    table::load_current_page(&mut view, &api);
    if let TableStatus::Failed(message) = view.status() {
        anyhow::bail!("{message}");
    }

    match format {
        OutputFormat::Json => {
            if let Some(data) = view.data() {
                let mut value = serde_json::to_value(data)?;
                value["page"] = Value::from(view.page());
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        OutputFormat::Csv => {
            println!("{}", COLUMNS.join(","));
            for row in view.rows() {
                let cells = [
                    row.customer_id.clone().unwrap_or_default(),
                    row.year_month.clone().unwrap_or_default(),
                    optional_number(row.monthly_total_spending),
                    optional_number(row.transactions_per_month),
                    optional_number(row.avg_transaction_amount),
                    optional_number(row.weekend_spending_ratio),
                ];
                let cells: Vec<String> = cells.iter().map(|c| csv_field(c)).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => print_monthly_table(&view),
    }
    Ok(())
}

/// Render the current page of `view` as an aligned table with its summary.
pub(crate) fn print_monthly_table(view: &MonthlyTableView) {
    let rows = view.display_rows();
    if rows.is_empty() {
        println!("  {}", "No rows match the current filters.".yellow());
    } else {
        let widths: Vec<usize> = (0..COLUMNS.len())
            .map(|col| {
                rows.iter()
                    .map(|r| r[col].chars().count())
                    .chain(std::iter::once(COLUMNS[col].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = COLUMNS
            .iter()
            .zip(widths.iter().copied())
            .map(|(name, w)| format!("{name:>w$}"))
            .collect();
        println!("  {}", header.join("  ").bold());
        println!("  {}", "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));

        for (i, row) in rows.iter().enumerate() {
            let cells: Vec<String> = row
                .iter()
                .zip(widths.iter().copied())
                .map(|(cell, w)| format!("{cell:>w$}"))
                .collect();
            let line = format!("  {}", cells.join("  "));
            if i % 2 == 0 {
                println!("{line}");
            } else {
                println!("{}", line.dimmed());
            }
        }
    }

    if let Some(summary) = view.summary() {
        println!();
        println!("  {}  {}", summary.bold(), view.page_label().dimmed());
    }
}

// ---------------------------------------------------------------------------
// ccdash predict / fields
// ---------------------------------------------------------------------------

/// Fill the prediction form from a JSON file and `Field=value` pairs, then submit.
pub fn run_predict(
    config: &DashboardConfig,
    assignments: &[String],
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let mut form = PredictionForm::new();

    if let Some(path) = input {
        for (field, value) in read_form_file(path)? {
            form.set_field(&field, &value)?;
        }
    }
    for assignment in assignments {
        let (field, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected Field=value, got '{assignment}'"))?;
        form.set_field(field.trim(), value)?;
    }

    let api = DashboardApi::from_config(config);
    dashboard::submit_prediction(&mut form, &api);

    match form.state() {
        PredictionState::InvalidInput(err) => anyhow::bail!("{err}"),
        PredictionState::Failed(message) => anyhow::bail!("{message}"),
        PredictionState::Result(score) => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "prediction": score }))?)
            }
            OutputFormat::Csv => println!("prediction\n{score}"),
            OutputFormat::Table => println!(
                "{} {}",
                "Predicted monthly spending:".bold(),
                format_decimal(*score, 2).green().bold()
            ),
        },
        state => {
            if let Some(message) = state.message() {
                println!("{}", message.yellow());
            }
        }
    }
    Ok(())
}

/// Read a JSON object of field values. Numbers and strings are accepted and
/// kept as text so the form applies its usual validation.
fn read_form_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {} as JSON", path.display()))?;
    let object = value
        .as_object()
        .with_context(|| format!("{} must contain a JSON object", path.display()))?;

    Ok(object
        .iter()
        .map(|(field, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (field.clone(), text)
        })
        .collect())
}

/// List the fields `ccdash predict` requires.
pub fn run_fields(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&PREDICT_FIELDS)?),
        OutputFormat::Csv => {
            println!("field");
            for field in PREDICT_FIELDS {
                println!("{field}");
            }
        }
        OutputFormat::Table => {
            println!("{}", "Prediction Fields".bold().cyan());
            for (i, field) in PREDICT_FIELDS.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, field);
            }
            println!();
            println!(
                "  {}",
                "Pass values with --set Field=value or --input values.json".dimmed()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ccdash health
// ---------------------------------------------------------------------------

/// Check backend reachability, config files and the request log.
pub fn run_health(config: &DashboardConfig) -> Result<()> {
    println!("{}", "ccdash Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.ccdash/config.toml found"
        } else {
            "not found (run `ccdash config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".ccdash.toml found"
        } else {
            "none (optional)"
        },
    );

    let api = DashboardApi::from_config(config);
    match api.health() {
        Ok(health) => {
            let detail = format!(
                "{} at {} ({})",
                health.status,
                config.api.base_url,
                health.service.as_deref().unwrap_or("unknown service")
            );
            print_health_item("Backend", health.is_ok(), &detail);
        }
        Err(err) => print_health_item("Backend", false, &err.to_string()),
    }

    match request_log(config) {
        Some(log) if log.path().exists() => {
            let entries = log.read_all();
            let failures = entries
                .iter()
                .filter(|e| !matches!(e.outcome, RequestOutcome::Ok | RequestOutcome::Cancelled))
                .count();
            print_health_item(
                "Request log",
                true,
                &format!("{} entries, {} failed", entries.len(), failures),
            );
        }
        Some(_) => print_health_item("Request log", true, "no log file yet"),
        None => print_health_item("Request log", false, "disabled (CCDASH_LOGGING=0)"),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// ccdash history
// ---------------------------------------------------------------------------

/// Show the most recent backend requests.
pub fn run_history(config: &DashboardConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let entries = request_log(config)
        .map(|log| log.read_recent(limit))
        .unwrap_or_default();

    if entries.is_empty() {
        println!(
            "{}",
            "No requests logged yet. Run a dashboard command to record some.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Csv => print_history_csv(&entries),
        OutputFormat::Table => print_history_table(&entries),
    }
    Ok(())
}

fn print_history_table(entries: &[RequestLogEntry]) {
    println!("{}", "Recent Backend Requests".bold().cyan());
    println!("{}", "=".repeat(78));
    println!(
        "  {:<19} {:<6} {:<26} {:>6} {:>8} Outcome",
        "Time", "Method", "Path", "Status", "Latency"
    );
    println!("  {}", "-".repeat(76));

    for entry in entries {
        let status = entry
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let outcome = match entry.outcome {
            RequestOutcome::Ok => entry.outcome.to_string().green(),
            RequestOutcome::Cancelled => entry.outcome.to_string().dimmed(),
            _ => entry.outcome.to_string().red(),
        };
        println!(
            "  {:<19} {:<6} {:<26} {:>6} {:>6}ms {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.method,
            truncate(&entry.path, 26),
            status,
            entry.latency_ms,
            outcome,
        );
        if let Some(message) = &entry.message {
            println!("  {}", truncate(message, 76).dimmed());
        }
    }
}

fn print_history_csv(entries: &[RequestLogEntry]) {
    println!("timestamp,method,path,status,latency_ms,outcome,message");
    for e in entries {
        println!(
            "{},{},{},{},{},{},{}",
            e.timestamp.to_rfc3339(),
            e.method,
            e.path,
            e.status.map(|s| s.to_string()).unwrap_or_default(),
            e.latency_ms,
            e.outcome,
            csv_field(e.message.as_deref().unwrap_or_default()),
        );
    }
}

fn request_log(config: &DashboardConfig) -> Option<RequestLog> {
    if !config.logging.enabled {
        return None;
    }
    expand_home(&config.logging.path).map(RequestLog::new)
}

// ---------------------------------------------------------------------------
// ccdash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective ccdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.ccdash/config.toml", global_exists);
    print_source(".ccdash.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "CCDASH_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.ccdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to point ccdash at your backend.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn print_section_error(message: &str) {
    println!("  {} {}", "✗".red().bold(), message.red());
}

fn print_overview_rows(stats: &[OverviewStat]) {
    for stat in stats {
        println!("  {:<26} {:>16}", format!("{}:", stat.label).bold(), stat.value);
    }
}

fn print_chart(bars: &[ChartBar]) {
    let name_width = bars
        .iter()
        .map(|b| b.name.chars().count())
        .max()
        .unwrap_or(0)
        .min(32);
    for bar in bars {
        println!(
            "  {:<name_width$} {} {}",
            truncate(&bar.name, name_width),
            render_bar(bar.share, BAR_WIDTH).cyan(),
            format_decimal(bar.importance, 4).dimmed(),
        );
    }
}

/// Horizontal bar for a 0-1 share, padded to `width` cells.
fn render_bar(share: f64, width: usize) -> String {
    let filled = (share.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), " ".repeat(width - filled))
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn test_render_bar() {
        assert_eq!(render_bar(1.0, 4), "████");
        assert_eq!(render_bar(0.5, 4), "██  ");
        assert_eq!(render_bar(0.0, 4), "    ");
        assert_eq!(render_bar(7.0, 2), "██");
    }

    #[test]
    fn test_csv_field() {
        assert_eq!(csv_field("C1001"), "C1001");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_read_form_file() {
        let dir = std::env::temp_dir().join(format!("ccdash-form-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("values.json");
        fs::write(&path, r#"{"Age": 42, "Income": "55000", "Note": null}"#).unwrap();

        let values = read_form_file(&path).unwrap();
        assert_eq!(values["Age"], "42");
        assert_eq!(values["Income"], "55000");
        assert_eq!(values["Note"], "");

        fs::write(&path, "[1, 2]").unwrap();
        assert!(read_form_file(&path).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
