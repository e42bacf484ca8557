/// Monthly features table: pagination/filter state and fetch lifecycle.
///
/// The view is a plain state machine; it never performs I/O itself. Callers
/// ask it for a [`FetchTicket`] whenever fetch-triggering state changes, run
/// the request however they like (inline or on a worker thread), and hand the
/// result back through [`MonthlyTableView::complete`].
///
/// ```text
/// Idle ──begin_fetch──▶ Loading ──complete(Ok)──▶ Loaded
///                          │  ▲                    │
///                          │  └──── begin_fetch ◀──┤ (page/size/filters changed)
///                          └──complete(Err)──▶ Failed
/// ```
///
/// Ordering: every ticket carries a generation number. Starting a new fetch
/// cancels the previous ticket's token and bumps the generation, so a late
/// response from a superseded request is reported as [`FetchOutcome::Stale`]
/// and never touches state.
use std::sync::LazyLock;

use regex::Regex;

use crate::api::DashboardApi;
use crate::api::types::{MAX_PAGE_SIZE, MonthlyFeaturesPage, MonthlyQuery, RowRecord};
use crate::http::{ApiError, CancellationToken, Transport};

use super::format::{PLACEHOLDER, format_decimal, format_integer, format_percent, or_placeholder};

/// `YYYY-MM`, the only year-month shape the backend accepts.
static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("year-month regex must compile"));

/// Column headers, in display order.
pub const COLUMNS: [&str; 6] = [
    "CustomerID",
    "YearMonth",
    "MonthlyTotalSpending",
    "NumberOfTransactionsPerMonth",
    "AvgTransactionAmount",
    "WeekendSpendingRatio",
];

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TableStatus {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// A request the caller must run on behalf of the view.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: MonthlyQuery,
    pub token: CancellationToken,
}

/// What [`MonthlyTableView::complete`] did with a result.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page is now displayed.
    Applied,
    /// The error is now displayed.
    Failed,
    /// The requested page was past the end; the page was clamped and this
    /// follow-up ticket must be run.
    Clamped(FetchTicket),
    /// A newer request superseded this one; the result was dropped.
    Stale,
    /// The request was cancelled; nothing changed.
    Cancelled,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MonthlyTableView {
    page: u32,
    page_size: u32,
    customer_id: Option<String>,
    year_month: Option<String>,
    customer_input: String,
    year_month_input: String,
    status: TableStatus,
    data: Option<MonthlyFeaturesPage>,
    /// Page and page size `data` was fetched with.
    loaded_page: u32,
    loaded_page_size: u32,
    generation: u64,
    in_flight: Option<CancellationToken>,
    input_error: Option<String>,
}

impl MonthlyTableView {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            customer_id: None,
            year_month: None,
            customer_input: String::new(),
            year_month_input: String::new(),
            status: TableStatus::Idle,
            data: None,
            loaded_page: 1,
            loaded_page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            generation: 0,
            in_flight: None,
            input_error: None,
        }
    }

    // -- Accessors --

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn year_month(&self) -> Option<&str> {
        self.year_month.as_deref()
    }

    pub fn customer_input(&self) -> &str {
        &self.customer_input
    }

    pub fn status(&self) -> &TableStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == TableStatus::Loading
    }

    pub fn data(&self) -> Option<&MonthlyFeaturesPage> {
        self.data.as_ref()
    }

    pub fn rows(&self) -> &[RowRecord] {
        self.data.as_ref().map_or(&[], |d| d.rows.as_slice())
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.data.as_ref().map(|d| d.total_pages)
    }

    /// Inline validation message from the last filter/page-size edit.
    pub fn input_error(&self) -> Option<&str> {
        self.input_error.as_deref()
    }

    /// Parameters for the next request.
    pub fn query(&self) -> MonthlyQuery {
        MonthlyQuery {
            page: self.page,
            page_size: self.page_size,
            customer_id: self.customer_id.clone(),
            year_month: self.year_month.clone(),
        }
    }

    // -- Fetch lifecycle --

    /// Enter `Loading` for the current state, superseding any in-flight request.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        self.status = TableStatus::Loading;

        FetchTicket {
            generation: self.generation,
            query: self.query(),
            token,
        }
    }

    /// Apply the result of the request issued with `generation`.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<MonthlyFeaturesPage, ApiError>,
    ) -> FetchOutcome {
        if generation != self.generation {
            return FetchOutcome::Stale;
        }

        match result {
            Err(err) if err.is_cancelled() => FetchOutcome::Cancelled,
            Err(err) => {
                self.in_flight = None;
                self.status = TableStatus::Failed(err.to_string());
                FetchOutcome::Failed
            }
            Ok(page) => {
                if page.total_pages > 0 && self.page > page.total_pages {
                    self.page = page.total_pages;
                    return FetchOutcome::Clamped(self.begin_fetch());
                }
                self.in_flight = None;
                self.data = Some(page);
                self.loaded_page = self.page;
                self.loaded_page_size = self.page_size;
                self.status = TableStatus::Loaded;
                FetchOutcome::Applied
            }
        }
    }

    /// Cancel any in-flight request. Results that arrive afterwards are stale.
    pub fn teardown(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.generation += 1;
    }

    // -- Filters --

    pub fn set_customer_input(&mut self, value: &str) {
        self.customer_input = value.to_string();
    }

    pub fn set_year_month_input(&mut self, value: &str) {
        self.year_month_input = value.to_string();
    }

    /// Commit the trimmed filter inputs and go back to page 1.
    ///
    /// Returns `Ok(true)` when fetch-triggering state changed and a new fetch
    /// is needed. An invalid year-month is reported inline and nothing is
    /// committed.
    pub fn submit_filters(&mut self) -> Result<bool, String> {
        let customer = non_empty(&self.customer_input);
        let year_month = non_empty(&self.year_month_input);

        if let Some(ym) = year_month.as_deref()
            && let Err(message) = validate_year_month(ym)
        {
            self.input_error = Some(message.clone());
            return Err(message);
        }
        self.input_error = None;

        let changed =
            self.page != 1 || self.customer_id != customer || self.year_month != year_month;
        self.page = 1;
        self.customer_id = customer;
        self.year_month = year_month;
        Ok(changed)
    }

    /// Clear both filter inputs and the committed filters.
    pub fn reset_filters(&mut self) -> bool {
        self.customer_input.clear();
        self.year_month_input.clear();
        self.input_error = None;
        let changed = self.page != 1 || self.customer_id.is_some() || self.year_month.is_some();
        self.page = 1;
        self.customer_id = None;
        self.year_month = None;
        changed
    }

    // -- Pagination --

    pub fn can_go_prev(&self) -> bool {
        !self.is_loading() && self.page > 1
    }

    pub fn can_go_next(&self) -> bool {
        !self.is_loading() && self.total_pages().is_some_and(|total| self.page < total)
    }

    pub fn prev_page(&mut self) -> bool {
        if !self.can_go_prev() {
            return false;
        }
        self.page -= 1;
        true
    }

    pub fn next_page(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.page += 1;
        true
    }

    /// Jump to a page. Pages past the end are clamped once the response
    /// reports the real page count.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let page = page.max(1);
        if page == self.page {
            return false;
        }
        self.page = page;
        true
    }

    /// Change the page size and go back to page 1.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<bool, String> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            let message = format!("page size must be between 1 and {MAX_PAGE_SIZE}");
            self.input_error = Some(message.clone());
            return Err(message);
        }
        self.input_error = None;
        let changed = self.page_size != page_size || self.page != 1;
        self.page_size = page_size;
        self.page = 1;
        Ok(changed)
    }

    // -- Rendering helpers --

    /// `"Showing X–Y of Z"` for the displayed rows, once data has loaded.
    ///
    /// Positions come from the page the rows were loaded with, which lags the
    /// requested page while a fetch is pending or after it failed.
    pub fn summary(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        let shown = data.rows.len() as u64;
        let (start, end) = if shown == 0 {
            (0, 0)
        } else {
            let start =
                u64::from(self.loaded_page - 1) * u64::from(self.loaded_page_size) + 1;
            (start, start + shown - 1)
        };
        Some(format!("Showing {start}–{end} of {}", data.total_rows))
    }

    /// `"Page X of Y"` for the displayed rows, with the total omitted until
    /// known. Falls back to the requested page before anything has loaded.
    pub fn page_label(&self) -> String {
        match self.total_pages() {
            Some(total) if total > 0 => format!("Page {} of {total}", self.loaded_page),
            Some(_) => format!("Page {}", self.loaded_page),
            None => format!("Page {}", self.page),
        }
    }

    /// Current rows formatted for display, one cell per [`COLUMNS`] entry.
    pub fn display_rows(&self) -> Vec<[String; 6]> {
        self.rows().iter().map(format_row).collect()
    }
}

/// Format one record for the table.
pub fn format_row(row: &RowRecord) -> [String; 6] {
    [
        row.customer_id
            .clone()
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        row.year_month
            .clone()
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        or_placeholder(row.monthly_total_spending, |v| format_decimal(v, 2)),
        or_placeholder(row.transactions_per_month, format_integer),
        or_placeholder(row.avg_transaction_amount, |v| format_decimal(v, 2)),
        or_placeholder(row.weekend_spending_ratio, format_percent),
    ]
}

/// Check a `YYYY-MM` filter value with a calendar-aware month.
pub fn validate_year_month(value: &str) -> Result<(), String> {
    let valid = YEAR_MONTH_RE
        .captures(value)
        .and_then(|caps| caps.get(2))
        .and_then(|month| month.as_str().parse::<u32>().ok())
        .is_some_and(|month| (1..=12).contains(&month));

    if valid {
        Ok(())
    } else {
        Err(format!("year-month must be in YYYY-MM format, got '{value}'"))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Blocking driver
// ---------------------------------------------------------------------------

/// Fetch the current page inline, following clamp re-requests until the
/// view settles. Used by one-shot commands; the interactive browser runs
/// tickets on worker threads instead.
pub fn load_current_page<T: Transport>(
    view: &mut MonthlyTableView,
    api: &DashboardApi<T>,
) -> FetchOutcome {
    let mut ticket = view.begin_fetch();
    loop {
        let result = api.fetch_monthly_features(&ticket.query, &ticket.token);
        match view.complete(ticket.generation, result) {
            FetchOutcome::Clamped(next) => ticket = next,
            outcome => return outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
