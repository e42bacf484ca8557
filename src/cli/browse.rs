//! `ccdash browse`: interactive pager over the monthly features table.
//!
//! One channel feeds the loop with both stdin lines and fetch completions.
//! Every fetch runs on its own worker thread, so typing `n` while a page is
//! loading is handled immediately and the superseded request is cancelled.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::Result;
use colored::Colorize;

use crate::api::DashboardApi;
use crate::api::types::MonthlyFeaturesPage;
use crate::config::DashboardConfig;
use crate::http::{ApiError, Transport};
use crate::views::table::{FetchOutcome, FetchTicket, MonthlyTableView, TableStatus};

use super::print_monthly_table;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Next,
    Prev,
    Page(u32),
    PageSize(u32),
    /// Edit the customer filter input (empty clears it). Not applied yet.
    Customer(String),
    /// Edit the year-month filter input (empty clears it). Not applied yet.
    Month(String),
    Apply,
    Reset,
    Refresh,
    Help,
    Quit,
    Unknown(String),
}

impl BrowseCommand {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "n" | "next" => Self::Next,
            "p" | "prev" => Self::Prev,
            "g" | "page" => match arg.parse() {
                Ok(page) => Self::Page(page),
                Err(_) => Self::Unknown(line.to_string()),
            },
            "s" | "size" => match arg.parse() {
                Ok(size) => Self::PageSize(size),
                Err(_) => Self::Unknown(line.to_string()),
            },
            "c" | "customer" => Self::Customer(arg.to_string()),
            "m" | "month" => Self::Month(arg.to_string()),
            "a" | "apply" => Self::Apply,
            "r" | "reset" => Self::Reset,
            "f" | "refresh" => Self::Refresh,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// What the loop must do after a command was applied to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Fetch-triggering state changed.
    Fetch,
    /// Only local state changed; redraw.
    Render,
    /// Show a message, state untouched.
    Notice(String),
    Help,
    Quit,
}

/// Apply one command to the view. Pure state transition, no I/O.
pub fn apply_command(view: &mut MonthlyTableView, command: BrowseCommand) -> Step {
    match command {
        BrowseCommand::Next => {
            if view.next_page() {
                Step::Fetch
            } else {
                Step::Notice(unavailable(view, "Already on the last page"))
            }
        }
        BrowseCommand::Prev => {
            if view.prev_page() {
                Step::Fetch
            } else {
                Step::Notice(unavailable(view, "Already on the first page"))
            }
        }
        BrowseCommand::Page(page) => {
            if view.go_to_page(page) {
                Step::Fetch
            } else {
                Step::Render
            }
        }
        BrowseCommand::PageSize(size) => match view.set_page_size(size) {
            Ok(true) => Step::Fetch,
            Ok(false) => Step::Render,
            Err(message) => Step::Notice(message),
        },
        BrowseCommand::Customer(value) => {
            view.set_customer_input(&value);
            Step::Notice(format!(
                "Customer filter set to '{}' (type 'apply' to search)",
                value
            ))
        }
        BrowseCommand::Month(value) => {
            view.set_year_month_input(&value);
            Step::Notice(format!(
                "Year-month filter set to '{}' (type 'apply' to search)",
                value
            ))
        }
        BrowseCommand::Apply => match view.submit_filters() {
            Ok(true) => Step::Fetch,
            Ok(false) => Step::Render,
            Err(message) => Step::Notice(message),
        },
        BrowseCommand::Reset => {
            if view.reset_filters() {
                Step::Fetch
            } else {
                Step::Render
            }
        }
        BrowseCommand::Refresh => Step::Fetch,
        BrowseCommand::Help => Step::Help,
        BrowseCommand::Quit => Step::Quit,
        BrowseCommand::Unknown(line) => Step::Notice(format!("Unknown command: {line}")),
    }
}

fn unavailable(view: &MonthlyTableView, at_bound: &str) -> String {
    if view.is_loading() {
        "Still loading, try again in a moment".to_string()
    } else {
        at_bound.to_string()
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Everything the loop reacts to.
#[derive(Debug)]
pub enum Event {
    Input(String),
    InputClosed,
    Fetched {
        generation: u64,
        result: Result<MonthlyFeaturesPage, ApiError>,
    },
}

/// Run `ticket` on a worker thread and post the result back to the loop.
fn dispatch<T: Transport + 'static>(
    api: &Arc<DashboardApi<T>>,
    events: &Sender<Event>,
    ticket: FetchTicket,
) {
    let api = Arc::clone(api);
    let events = events.clone();
    thread::spawn(move || {
        let result = api.fetch_monthly_features(&ticket.query, &ticket.token);
        // The loop may already be gone; nothing to do then.
        let _ = events.send(Event::Fetched {
            generation: ticket.generation,
            result,
        });
    });
}

/// Drive `view` from `events` until the user quits or input closes.
///
/// `on_change` is called whenever the view has something new to show: a
/// loaded page, an error, a notice or help text. In-flight work is cancelled
/// on return.
pub fn run_event_loop<T, F>(
    api: Arc<DashboardApi<T>>,
    view: &mut MonthlyTableView,
    sender: &Sender<Event>,
    events: &Receiver<Event>,
    mut on_change: F,
) where
    T: Transport + 'static,
    F: FnMut(&MonthlyTableView, Option<&Step>),
{
    dispatch(&api, sender, view.begin_fetch());
    on_change(view, None);

    while let Ok(event) = events.recv() {
        match event {
            Event::Fetched { generation, result } => match view.complete(generation, result) {
                FetchOutcome::Applied | FetchOutcome::Failed => on_change(view, None),
                FetchOutcome::Clamped(ticket) => dispatch(&api, sender, ticket),
                FetchOutcome::Stale | FetchOutcome::Cancelled => {}
            },
            Event::Input(line) => {
                let Some(command) = BrowseCommand::parse(&line) else {
                    continue;
                };
                match apply_command(view, command) {
                    Step::Quit => break,
                    Step::Fetch => {
                        dispatch(&api, sender, view.begin_fetch());
                        on_change(view, None);
                    }
                    step => on_change(view, Some(&step)),
                }
            }
            Event::InputClosed => break,
        }
    }

    view.teardown();
}

/// Entry point for `ccdash browse`.
pub fn run_browse(
    config: &DashboardConfig,
    page_size: Option<u32>,
    customer: Option<&str>,
    year_month: Option<&str>,
) -> Result<()> {
    let mut view = MonthlyTableView::new(page_size.unwrap_or(config.table.page_size));
    view.set_customer_input(customer.unwrap_or_default());
    view.set_year_month_input(year_month.unwrap_or_default());
    view.submit_filters().map_err(anyhow::Error::msg)?;

    let api = Arc::new(DashboardApi::from_config(config));
    let (sender, events) = mpsc::channel();

    let input = sender.clone();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if input.send(Event::Input(line)).is_err() {
                return;
            }
        }
        let _ = input.send(Event::InputClosed);
    });

    println!("{}", "Monthly Features Browser".bold().cyan());
    println!("{}", "Type 'help' for commands, 'q' to quit.".dimmed());

    run_event_loop(api, &mut view, &sender, &events, |view, step| {
        render(view, step);
    });
    Ok(())
}

fn render(view: &MonthlyTableView, step: Option<&Step>) {
    match step {
        Some(Step::Notice(message)) => println!("  {}", message.yellow()),
        Some(Step::Help) => print_help(),
        Some(Step::Render) | Some(Step::Fetch) | Some(Step::Quit) | None => match view.status() {
            TableStatus::Loading => println!("  {}", "Loading...".dimmed()),
            TableStatus::Failed(message) => println!("  {} {}", "Error:".red().bold(), message),
            TableStatus::Idle | TableStatus::Loaded => {
                println!();
                print_monthly_table(view);
            }
        },
    }
    print_prompt(view);
}

fn print_prompt(view: &MonthlyTableView) {
    let mut filters = Vec::new();
    if let Some(customer) = view.customer_id() {
        filters.push(format!("customer={customer}"));
    }
    if let Some(year_month) = view.year_month() {
        filters.push(format!("month={year_month}"));
    }
    let label = if filters.is_empty() {
        view.page_label()
    } else {
        format!("{} [{}]", view.page_label(), filters.join(" "))
    };
    print!("{} ", format!("{label} >").bold());
    let _ = io::stdout().flush();
}

fn print_help() {
    println!("{}", "Commands".bold().cyan());
    for (keys, text) in [
        ("n, next", "next page"),
        ("p, prev", "previous page"),
        ("g, page N", "jump to page N"),
        ("s, size N", "rows per page (1-200)"),
        ("c, customer ID", "set customer filter (empty clears)"),
        ("m, month YYYY-MM", "set year-month filter (empty clears)"),
        ("a, apply", "apply filters and return to page 1"),
        ("r, reset", "clear filters"),
        ("f, refresh", "reload the current page"),
        ("q, quit", "exit"),
    ] {
        println!("  {:<20} {}", keys, text.dimmed());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(BrowseCommand::parse("  "), None);
        assert_eq!(BrowseCommand::parse("n"), Some(BrowseCommand::Next));
        assert_eq!(BrowseCommand::parse("PREV"), Some(BrowseCommand::Prev));
        assert_eq!(BrowseCommand::parse("g 7"), Some(BrowseCommand::Page(7)));
        assert_eq!(BrowseCommand::parse("size 25"), Some(BrowseCommand::PageSize(25)));
        assert_eq!(
            BrowseCommand::parse("c  C1001 "),
            Some(BrowseCommand::Customer("C1001".to_string()))
        );
        assert_eq!(
            BrowseCommand::parse("month"),
            Some(BrowseCommand::Month(String::new()))
        );
        assert_eq!(
            BrowseCommand::parse("g seven"),
            Some(BrowseCommand::Unknown("g seven".to_string()))
        );
        assert_eq!(BrowseCommand::parse("q"), Some(BrowseCommand::Quit));
    }

    #[test]
    fn filter_edits_wait_for_apply() {
        let mut view = MonthlyTableView::new(50);
        let step = apply_command(&mut view, BrowseCommand::Customer("C1".to_string()));
        assert!(matches!(step, Step::Notice(_)));
        assert_eq!(view.customer_id(), None);
        assert_eq!(apply_command(&mut view, BrowseCommand::Apply), Step::Fetch);
        assert_eq!(view.customer_id(), Some("C1"));
        assert_eq!(apply_command(&mut view, BrowseCommand::Apply), Step::Render);
    }

    #[test]
    fn invalid_month_is_a_notice() {
        let mut view = MonthlyTableView::new(50);
        apply_command(&mut view, BrowseCommand::Month("2024-13".to_string()));
        let step = apply_command(&mut view, BrowseCommand::Apply);
        assert!(matches!(step, Step::Notice(message) if message.contains("YYYY-MM")));
    }

    #[test]
    fn navigation_while_loading_is_refused() {
        let mut view = MonthlyTableView::new(50);
        let _ticket = view.begin_fetch();
        assert_eq!(
            apply_command(&mut view, BrowseCommand::Prev),
            Step::Notice("Still loading, try again in a moment".to_string())
        );
    }

    #[test]
    fn page_size_out_of_range_is_a_notice() {
        let mut view = MonthlyTableView::new(50);
        assert!(matches!(
            apply_command(&mut view, BrowseCommand::PageSize(0)),
            Step::Notice(_)
        ));
        assert_eq!(apply_command(&mut view, BrowseCommand::PageSize(20)), Step::Fetch);
    }
}
