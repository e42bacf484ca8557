/// Integration tests for the dashboard and monthly table views driven through
/// the API layer with a scripted in-process transport.
///
/// Wire-level behavior of the real transport is covered in `http_tests.rs`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use ccdash::api::DashboardApi;
use ccdash::cli::browse::{self, Event};
use ccdash::config::DashboardSettings;
use ccdash::http::{CancellationToken, HttpRequest, RawResponse, Transport, TransportError};
use ccdash::views::dashboard::{self, DashboardView, INVALID_RESULT, PredictionForm, PredictionState};
use ccdash::views::table::{self, FetchOutcome, MonthlyTableView, TableStatus};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&HttpRequest) -> (u16, String) + Send + Sync;

/// Answers every request with `respond` and records what was sent.
struct Scripted {
    respond: Box<Responder>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Scripted {
    fn new(respond: impl Fn(&HttpRequest) -> (u16, String) + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Transport for Scripted {
    fn execute(
        &self,
        request: &HttpRequest,
        _cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let (status, body) = (self.respond)(request);
        Ok(RawResponse::new(status, "", body))
    }
}

fn api(respond: impl Fn(&HttpRequest) -> (u16, String) + Send + Sync + 'static) -> DashboardApi<Scripted> {
    DashboardApi::new("http://backend.test", Scripted::new(respond))
}

fn seen(api: &DashboardApi<Scripted>) -> Vec<HttpRequest> {
    api.client().transport().seen.lock().unwrap().clone()
}

/// A monthly page with `rows` rows tagged `tag`.
fn monthly_body(tag: &str, rows: usize, total_rows: u64, total_pages: u32) -> String {
    let rows: Vec<_> = (0..rows)
        .map(|i| json!({"CustomerID": format!("{tag}-{i}"), "YearMonth": "2023-01"}))
        .collect();
    json!({
        "rows": rows,
        "total_rows": total_rows,
        "total_pages": total_pages,
        "page_size": 10,
    })
    .to_string()
}

fn page_param(request: &HttpRequest) -> u32 {
    request
        .query_value("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

fn wait_until(flag: &AtomicBool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !flag.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "timed out waiting for worker");
        thread::sleep(Duration::from_millis(5));
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[test]
fn dashboard_sections_load_and_fail_independently() {
    let api = api(|request| match request.path.as_str() {
        "/api/feature-importance" => (500, r#"{"error": "model not loaded"}"#.to_string()),
        "/api/metrics/overview" => (
            200,
            r#"{"total_rows": 600000, "unique_customers": 5000, "months_covered": 13}"#.to_string(),
        ),
        _ => (404, String::new()),
    });

    let mut view = DashboardView::new(&DashboardSettings::default());
    dashboard::load_dashboard(&mut view, &api);

    assert_eq!(view.features().error(), Some("model not loaded"));
    assert!(view.chart_data().is_empty());
    let stats = view.overview_stats();
    assert_eq!(stats[0].value, "600,000");
    assert_eq!(stats[1].value, "5,000");
    assert_eq!(seen(&api).len(), 2);
}

#[test]
fn malformed_feature_items_are_dropped() {
    let api = api(|_| {
        (
            200,
            r#"{"features": [{"feature": "A", "value": "0.5"}, {"name": "B"}, {}]}"#.to_string(),
        )
    });
    let mut view = DashboardView::new(&DashboardSettings::default());
    view.apply_features(api.fetch_feature_importance());

    let names: Vec<&str> = view.summary_features().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["A"]);
    assert_eq!(view.chart_data()[0].importance, 0.5);
}

#[test]
fn invalid_prediction_form_issues_no_request() {
    let api = api(|_| (200, r#"{"prediction": 1.0}"#.to_string()));
    let mut form = PredictionForm::new();
    for field in ccdash::api::PREDICT_FIELDS {
        form.set_field(field, "100").unwrap();
    }
    form.set_field("DaysSinceLastTransaction", "yesterday").unwrap();

    dashboard::submit_prediction(&mut form, &api);

    match form.state() {
        PredictionState::InvalidInput(err) => {
            assert_eq!(err.field(), "DaysSinceLastTransaction");
            assert!(err.to_string().contains("DaysSinceLastTransaction"));
        }
        other => panic!("expected local rejection, got {other:?}"),
    }
    assert!(seen(&api).is_empty());
}

#[test]
fn prediction_results_are_coerced() {
    let mut form = PredictionForm::new();
    for field in ccdash::api::PREDICT_FIELDS {
        form.set_field(field, " 3 ").unwrap();
    }

    let numeric = api(|_| (200, r#"{"prediction": "0.73"}"#.to_string()));
    dashboard::submit_prediction(&mut form, &numeric);
    assert_eq!(form.state(), &PredictionState::Result(0.73));
    let body = seen(&numeric)[0].body.clone().unwrap();
    assert_eq!(body["Age"], 3.0);

    let bare = api(|_| (200, "42.5".to_string()));
    dashboard::submit_prediction(&mut form, &bare);
    assert_eq!(form.state(), &PredictionState::Result(42.5));

    let garbage = api(|_| (200, r#"{"prediction": "not-a-number"}"#.to_string()));
    dashboard::submit_prediction(&mut form, &garbage);
    assert_eq!(form.state(), &PredictionState::InvalidResult);
    assert_eq!(form.state().message().as_deref(), Some(INVALID_RESULT));

    let failing = api(|_| (422, r#"{"error": "Missing fields: Age"}"#.to_string()));
    dashboard::submit_prediction(&mut form, &failing);
    assert_eq!(
        form.state(),
        &PredictionState::Failed("Missing fields: Age".to_string())
    );
}

// ---------------------------------------------------------------------------
// Monthly table
// ---------------------------------------------------------------------------

#[test]
fn out_of_range_page_is_clamped_and_refetched() {
    let api = api(|request| {
        let page = page_param(request);
        let rows = if page <= 3 { 10 } else { 0 };
        (200, monthly_body("p", rows, 30, 3))
    });

    let mut view = MonthlyTableView::new(10);
    view.go_to_page(5);
    let outcome = table::load_current_page(&mut view, &api);

    assert!(matches!(outcome, FetchOutcome::Applied));
    assert_eq!(view.page(), 3);
    assert_eq!(view.rows().len(), 10);
    let pages: Vec<u32> = seen(&api).iter().map(page_param).collect();
    assert_eq!(pages, vec![5, 3]);
}

#[test]
fn backend_error_is_shown_inline() {
    let api = api(|_| (400, r#"{"error": "page_size must be between 1 and 200"}"#.to_string()));
    let mut view = MonthlyTableView::new(10);
    table::load_current_page(&mut view, &api);
    assert_eq!(
        view.status(),
        &TableStatus::Failed("page_size must be between 1 and 200".to_string())
    );
}

#[test]
fn stale_response_does_not_overwrite_newer_filters() {
    let started = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));

    let api = {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        Arc::new(api(move |request| {
            if request.query_value("customer_id").is_some() {
                return (200, monthly_body("C7", 2, 2, 1));
            }
            // The unfiltered request is slow and resolves after the filtered one.
            started.store(true, Ordering::SeqCst);
            wait_until(&release);
            (200, monthly_body("all", 10, 5000, 500))
        }))
    };

    let (tx, rx) = mpsc::channel();
    let spawn_fetch = |ticket: ccdash::views::FetchTicket| {
        let api = Arc::clone(&api);
        let tx = tx.clone();
        thread::spawn(move || {
            let result = api.fetch_monthly_features(&ticket.query, &ticket.token);
            tx.send((ticket.generation, result)).unwrap();
        })
    };

    let mut view = MonthlyTableView::new(10);
    let first = view.begin_fetch();
    let first_token = first.token.clone();
    let slow = spawn_fetch(first);
    wait_until(&started);

    view.set_customer_input("C7");
    assert_eq!(view.submit_filters(), Ok(true));
    let fast = spawn_fetch(view.begin_fetch());
    assert!(first_token.is_cancelled());

    let (generation, result) = rx.recv().unwrap();
    assert!(matches!(view.complete(generation, result), FetchOutcome::Applied));
    fast.join().unwrap();

    release.store(true, Ordering::SeqCst);
    let (generation, result) = rx.recv().unwrap();
    assert!(matches!(view.complete(generation, result), FetchOutcome::Stale));
    slow.join().unwrap();

    assert_eq!(view.status(), &TableStatus::Loaded);
    assert_eq!(view.data().unwrap().total_rows, 2);
    assert_eq!(view.rows()[0].customer_id.as_deref(), Some("C7-0"));
}

#[test]
fn browse_loop_pages_forward_and_quits() {
    let api = Arc::new(api(|request| {
        let page = page_param(request);
        (200, monthly_body(&format!("p{page}"), 10, 30, 3))
    }));

    let (sender, events) = mpsc::channel();
    let input = sender.clone();
    let mut loaded_pages = Vec::new();
    let mut view = MonthlyTableView::new(10);

    browse::run_event_loop(Arc::clone(&api), &mut view, &sender, &events, |view, step| {
        if step.is_some() || view.status() != &TableStatus::Loaded {
            return;
        }
        loaded_pages.push(view.page());
        let next = if view.page() < 2 { "n" } else { "q" };
        input.send(Event::Input(next.to_string())).unwrap();
    });

    assert_eq!(loaded_pages, vec![1, 2]);
    assert_eq!(view.page(), 2);
    assert_eq!(view.rows()[0].customer_id.as_deref(), Some("p2-0"));
    let pages: Vec<u32> = seen(&api).iter().map(page_param).collect();
    assert_eq!(pages, vec![1, 2]);
}

#[test]
fn browse_loop_stops_when_input_closes() {
    let api = Arc::new(api(|_| (200, monthly_body("x", 1, 1, 1))));
    let (sender, events) = mpsc::channel();
    sender.send(Event::InputClosed).unwrap();

    let mut view = MonthlyTableView::new(10);
    browse::run_event_loop(api, &mut view, &sender, &events, |_, _| {});

    // Torn down before the first page could be applied.
    assert_eq!(view.status(), &TableStatus::Loading);
}
