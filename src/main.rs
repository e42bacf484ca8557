use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ccdash::cli::{self, MonthlyArgs, OutputFormat};
use ccdash::config;

#[derive(Debug, Parser)]
#[command(name = "ccdash")]
#[command(about = "Credit card spending analytics dashboard for the terminal")]
struct App {
    /// Backend base URL (overrides config and CCDASH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Overview stats, top spending drivers and the feature-importance chart
    Dashboard {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Feature-importance ranking
    Features {
        /// Only show the top N features
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Aggregate dataset statistics
    Overview {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// One page of the monthly features table
    Monthly {
        /// Page number (clamped to the last page)
        #[arg(long)]
        page: Option<u32>,
        /// Rows per page (1-200)
        #[arg(long)]
        page_size: Option<u32>,
        /// Only rows for this customer
        #[arg(long)]
        customer: Option<String>,
        /// Only rows for this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Page through the monthly features table interactively
    Browse {
        /// Rows per page (1-200)
        #[arg(long)]
        page_size: Option<u32>,
        /// Start filtered to this customer
        #[arg(long)]
        customer: Option<String>,
        /// Start filtered to this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
    /// Predict monthly spending from the 15 model features
    Predict {
        /// Field value, repeatable: --set Age=42
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
        /// JSON object of field values (applied before --set)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List the fields `predict` requires
    Fields {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check backend reachability, config files and the request log
    Health,
    /// Show recent backend requests from the request log
    History {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (merged) configuration
    Show,
    /// Write a default config to ~/.ccdash/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a value, e.g. `ccdash config set api.base_url http://host:5000`
    Set { key: String, value: String },
    /// Reset ~/.ccdash/config.toml to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let mut cfg = config::load();
    if let Some(url) = app.api_url {
        cfg.api.base_url = url;
    }

    match app.command {
        Commands::Dashboard { format } => {
            cli::run_dashboard(&cfg, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Features { limit, format } => {
            cli::run_features(&cfg, OutputFormat::from_str_opt(Some(&format)), limit)
        }
        Commands::Overview { format } => {
            cli::run_overview(&cfg, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Monthly {
            page,
            page_size,
            customer,
            month,
            format,
        } => {
            let args = MonthlyArgs {
                page,
                page_size,
                customer,
                year_month: month,
            };
            cli::run_monthly(&cfg, &args, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Browse {
            page_size,
            customer,
            month,
        } => cli::browse::run_browse(&cfg, page_size, customer.as_deref(), month.as_deref()),
        Commands::Predict {
            assignments,
            input,
            format,
        } => cli::run_predict(
            &cfg,
            &assignments,
            input.as_deref(),
            OutputFormat::from_str_opt(Some(&format)),
        ),
        Commands::Fields { format } => cli::run_fields(OutputFormat::from_str_opt(Some(&format))),
        Commands::Health => cli::run_health(&cfg),
        Commands::History { limit, format } => {
            cli::run_history(&cfg, limit, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
