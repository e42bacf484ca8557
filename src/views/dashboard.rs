/// Dashboard view: feature importance, overview stats and the prediction form.
///
/// The three sections share nothing. Each one loads (or submits) on its own
/// and a failure in one never blanks the others.
use std::collections::BTreeMap;
use std::thread;

use crate::api::DashboardApi;
use crate::api::types::{
    FeatureImportanceItem, OverviewMetrics, PREDICT_FIELDS, PredictionOutcome, PredictionRequest,
};
use crate::config::DashboardSettings;
use crate::http::{ApiError, Transport};

use super::format::{format_count, format_decimal, format_integer, or_placeholder};

/// Shown when the prediction response carries no usable number.
pub const INVALID_RESULT: &str = "Received an invalid result from the prediction service";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Load state of one independently fetched section.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Section<T> {
    fn from_result(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => Self::Ready(value),
            Err(err) => Self::Failed(err.to_string()),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// One bar of the importance chart.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChartBar {
    pub name: String,
    pub importance: f64,
    /// Fraction of the largest importance in the chart, 0-1.
    pub share: f64,
}

/// A labeled overview value, already formatted.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OverviewStat {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

#[derive(Clone, Copy)]
enum StatFormat {
    Count,
    Integer,
    Decimal(usize),
}

/// Overview keys shown on the dashboard, in display order.
const OVERVIEW_STATS: [(&str, &str, StatFormat); 5] = [
    ("total_rows", "Total rows", StatFormat::Count),
    ("unique_customers", "Unique customers", StatFormat::Count),
    ("months_covered", "Months covered", StatFormat::Integer),
    ("mean_monthly_spending", "Mean monthly spending", StatFormat::Decimal(2)),
    ("avg_txn_per_month", "Avg transactions / month", StatFormat::Decimal(1)),
];

fn format_stat(value: f64, format: StatFormat) -> String {
    match format {
        StatFormat::Count if value >= 0.0 && value.fract() == 0.0 => format_count(value as u64),
        StatFormat::Count | StatFormat::Integer => format_integer(value),
        StatFormat::Decimal(places) => format_decimal(value, places),
    }
}

// ---------------------------------------------------------------------------
// Dashboard view
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DashboardView {
    features: Section<Vec<FeatureImportanceItem>>,
    overview: Section<OverviewMetrics>,
    pub form: PredictionForm,
    summary_count: usize,
    chart_count: usize,
}

impl DashboardView {
    pub fn new(settings: &DashboardSettings) -> Self {
        Self {
            features: Section::Loading,
            overview: Section::Loading,
            form: PredictionForm::new(),
            summary_count: settings.summary_count.max(1),
            chart_count: settings.chart_count.max(1),
        }
    }

    pub fn features(&self) -> &Section<Vec<FeatureImportanceItem>> {
        &self.features
    }

    pub fn overview(&self) -> &Section<OverviewMetrics> {
        &self.overview
    }

    pub fn apply_features(&mut self, result: Result<Vec<FeatureImportanceItem>, ApiError>) {
        self.features = Section::from_result(result);
    }

    pub fn apply_overview(&mut self, result: Result<OverviewMetrics, ApiError>) {
        self.overview = Section::from_result(result);
    }

    /// Top features for the "top drivers" summary list.
    pub fn summary_features(&self) -> &[FeatureImportanceItem] {
        match self.features.ready() {
            Some(items) => &items[..items.len().min(self.summary_count)],
            None => &[],
        }
    }

    /// Chart-ready bars for the top features.
    pub fn chart_data(&self) -> Vec<ChartBar> {
        let Some(items) = self.features.ready() else {
            return Vec::new();
        };
        let top = &items[..items.len().min(self.chart_count)];
        let max = top.iter().map(|i| i.importance).fold(0.0_f64, f64::max);

        top.iter()
            .map(|item| ChartBar {
                name: item.name.clone(),
                importance: item.importance,
                share: if max > 0.0 {
                    (item.importance / max).clamp(0.0, 1.0)
                } else {
                    0.0
                },
            })
            .collect()
    }

    /// The fixed overview stats. Missing or non-numeric values render as the
    /// placeholder. Empty until the overview has loaded.
    pub fn overview_stats(&self) -> Vec<OverviewStat> {
        let Some(metrics) = self.overview.ready() else {
            return Vec::new();
        };
        OVERVIEW_STATS
            .iter()
            .map(|&(key, label, format)| OverviewStat {
                key,
                label,
                value: or_placeholder(metrics.number(key), |v| format_stat(v, format)),
            })
            .collect()
    }
}

/// Run both initial loads concurrently and apply each result independently.
pub fn load_dashboard<T: Transport>(view: &mut DashboardView, api: &DashboardApi<T>) {
    let (features, overview) = thread::scope(|scope| {
        let features = scope.spawn(|| api.fetch_feature_importance());
        let overview = scope.spawn(|| api.fetch_overview());
        (
            features
                .join()
                .unwrap_or_else(|_| Err(worker_panicked("Feature importance request"))),
            overview
                .join()
                .unwrap_or_else(|_| Err(worker_panicked("Overview request"))),
        )
    });
    view.apply_features(features);
    view.apply_overview(overview);
}

fn worker_panicked(context: &str) -> ApiError {
    ApiError::Network {
        context: context.to_string(),
        reason: "worker thread panicked".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Prediction form
// ---------------------------------------------------------------------------

/// A form field that cannot be submitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("{field} is required")]
    Missing { field: String },

    #[error("{field} must be a number (got '{value}')")]
    NotNumeric { field: String, value: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

impl FormError {
    /// The offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field } | Self::NotNumeric { field, .. } | Self::UnknownField { field } => {
                field
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionState {
    Idle,
    Submitting,
    /// Rejected locally; no request was sent.
    InvalidInput(FormError),
    Result(f64),
    /// The backend answered without a usable number.
    InvalidResult,
    Failed(String),
}

impl PredictionState {
    /// Text shown under the form.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::Submitting => Some("Predicting...".to_string()),
            Self::InvalidInput(err) => Some(err.to_string()),
            Self::Result(score) => Some(format!("Predicted spending: {}", format_decimal(*score, 2))),
            Self::InvalidResult => Some(INVALID_RESULT.to_string()),
            Self::Failed(message) => Some(message.clone()),
        }
    }
}

/// Raw text inputs for the 15 prediction fields. Nothing is sent until submit.
#[derive(Debug, Clone)]
pub struct PredictionForm {
    values: BTreeMap<&'static str, String>,
    state: PredictionState,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionForm {
    pub fn new() -> Self {
        Self {
            values: PREDICT_FIELDS.iter().map(|f| (*f, String::new())).collect(),
            state: PredictionState::Idle,
        }
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    /// Set a field's raw text. Unknown field names are rejected.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(FormError::UnknownField {
                field: field.to_string(),
            }),
        }
    }

    /// Coerce every field to a number, failing on the first one (in form
    /// order) that is empty or non-numeric.
    pub fn validate(&self) -> Result<PredictionRequest, FormError> {
        let mut numbers = BTreeMap::new();
        for field in PREDICT_FIELDS {
            let raw = self.values.get(field).map(|v| v.trim()).unwrap_or_default();
            if raw.is_empty() {
                return Err(FormError::Missing {
                    field: field.to_string(),
                });
            }
            let number = raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| FormError::NotNumeric {
                    field: field.to_string(),
                    value: raw.to_string(),
                })?;
            numbers.insert(field.to_string(), number);
        }
        PredictionRequest::from_values(&numbers).map_err(|field| FormError::Missing {
            field: field.to_string(),
        })
    }

    /// Validate and enter `Submitting`. On failure the error is shown inline
    /// and the caller must not send anything.
    pub fn begin_submit(&mut self) -> Option<PredictionRequest> {
        match self.validate() {
            Ok(request) => {
                self.state = PredictionState::Submitting;
                Some(request)
            }
            Err(err) => {
                self.state = PredictionState::InvalidInput(err);
                None
            }
        }
    }

    pub fn finish_submit(&mut self, result: Result<PredictionOutcome, ApiError>) {
        self.state = match result {
            Ok(PredictionOutcome::Score(score)) => PredictionState::Result(score),
            Ok(PredictionOutcome::Invalid) => PredictionState::InvalidResult,
            Err(err) => PredictionState::Failed(err.to_string()),
        };
    }
}

/// Validate the form and, only if it is valid, call the prediction endpoint.
pub fn submit_prediction<T: Transport>(form: &mut PredictionForm, api: &DashboardApi<T>) {
    if let Some(request) = form.begin_submit() {
        let result = api.predict(&request);
        form.finish_submit(result);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::views::format::PLACEHOLDER;

    fn items(pairs: &[(&str, f64)]) -> Vec<FeatureImportanceItem> {
        pairs
            .iter()
            .map(|(name, importance)| FeatureImportanceItem {
                name: name.to_string(),
                importance: *importance,
            })
            .collect()
    }

    fn filled_form() -> PredictionForm {
        let mut form = PredictionForm::new();
        for field in PREDICT_FIELDS {
            form.set_field(field, "1.5").unwrap();
        }
        form
    }

    #[test]
    fn summary_and_chart_take_top_n() {
        let mut view = DashboardView::new(&DashboardSettings::default());
        let many: Vec<(String, f64)> = (0..12).map(|i| (format!("F{i}"), 12.0 - i as f64)).collect();
        let pairs: Vec<(&str, f64)> = many.iter().map(|(n, v)| (n.as_str(), *v)).collect();
        view.apply_features(Ok(items(&pairs)));

        let summary: Vec<&str> = view.summary_features().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(summary, vec!["F0", "F1", "F2"]);

        let chart = view.chart_data();
        assert_eq!(chart.len(), 10);
        assert_eq!(chart[0].share, 1.0);
        assert_eq!(chart[9].name, "F9");
        assert!((chart[9].share - 3.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn short_feature_lists_are_not_padded() {
        let mut view = DashboardView::new(&DashboardSettings::default());
        view.apply_features(Ok(items(&[("A", 0.5), ("B", 0.0)])));
        assert_eq!(view.summary_features().len(), 2);
        assert_eq!(view.chart_data().len(), 2);
        assert_eq!(view.chart_data()[1].share, 0.0);
    }

    #[test]
    fn overview_stats_use_placeholder_for_missing_keys() {
        let mut view = DashboardView::new(&DashboardSettings::default());
        view.apply_overview(Ok(OverviewMetrics::from_value(json!({
            "total_rows": 600000,
            "months_covered": "13",
            "mean_monthly_spending": 20000.5,
            "avg_txn_per_month": "lots"
        }))));

        let stats = view.overview_stats();
        let value = |key: &str| stats.iter().find(|s| s.key == key).unwrap().value.clone();
        assert_eq!(stats.len(), 5);
        assert_eq!(value("total_rows"), "600,000");
        assert_eq!(value("unique_customers"), PLACEHOLDER);
        assert_eq!(value("months_covered"), "13");
        assert_eq!(value("mean_monthly_spending"), "20,000.50");
        assert_eq!(value("avg_txn_per_month"), PLACEHOLDER);
    }

    #[test]
    fn sections_fail_independently() {
        let mut view = DashboardView::new(&DashboardSettings::default());
        view.apply_features(Err(ApiError::Http {
            status: 500,
            message: "model not loaded".to_string(),
        }));
        view.apply_overview(Ok(OverviewMetrics::from_value(json!({"total_rows": 1}))));

        assert_eq!(view.features().error(), Some("model not loaded"));
        assert!(view.summary_features().is_empty());
        assert!(view.overview().ready().is_some());
        assert_eq!(view.overview_stats()[0].value, "1");
    }

    #[test]
    fn non_numeric_field_is_named() {
        let mut form = filled_form();
        form.set_field("Income", "abc").unwrap();
        let err = form.validate().unwrap_err();
        assert_eq!(err.field(), "Income");
        assert_eq!(err.to_string(), "Income must be a number (got 'abc')");
    }

    #[test]
    fn first_invalid_field_in_form_order_wins() {
        let mut form = filled_form();
        form.set_field("Age", "").unwrap();
        form.set_field("AvgTransactionAmount", "x").unwrap();
        assert_eq!(form.validate().unwrap_err().field(), "AvgTransactionAmount");
    }

    #[test]
    fn empty_field_is_missing() {
        let mut form = filled_form();
        form.set_field("Age", "   ").unwrap();
        assert_eq!(
            form.validate().unwrap_err(),
            FormError::Missing {
                field: "Age".to_string()
            }
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut form = PredictionForm::new();
        assert!(matches!(
            form.set_field("Nope", "1"),
            Err(FormError::UnknownField { .. })
        ));
    }

    #[test]
    fn submit_lifecycle() {
        let mut form = filled_form();
        assert!(form.begin_submit().is_some());
        assert_eq!(form.state(), &PredictionState::Submitting);

        form.finish_submit(Ok(PredictionOutcome::Score(0.73)));
        assert_eq!(form.state(), &PredictionState::Result(0.73));
        assert_eq!(
            form.state().message().as_deref(),
            Some("Predicted spending: 0.73")
        );

        form.finish_submit(Ok(PredictionOutcome::Invalid));
        assert_eq!(form.state().message().as_deref(), Some(INVALID_RESULT));
    }

    #[test]
    fn invalid_form_does_not_begin_submit() {
        let mut form = PredictionForm::new();
        assert!(form.begin_submit().is_none());
        assert!(matches!(form.state(), PredictionState::InvalidInput(_)));
    }
}
