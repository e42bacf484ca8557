/// Strongly typed views of the backend payloads.
///
/// Every type here is produced by the total parsing functions in
/// [`super::normalize`]; nothing is deserialized directly with serde because
/// the backend's payloads are loosely typed.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::normalize::coerce_number;

// ---------------------------------------------------------------------------
// Feature importance
// ---------------------------------------------------------------------------

/// One entry in the model's feature-importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportanceItem {
    pub name: String,
    pub importance: f64,
}

// ---------------------------------------------------------------------------
// Overview metrics
// ---------------------------------------------------------------------------

/// Aggregate dataset statistics, kept opaque. Values are coerced to numbers
/// only when read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OverviewMetrics(Map<String, Value>);

impl OverviewMetrics {
    /// Wrap a decoded payload. Anything other than an object yields no metrics.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Numeric value of a metric, if present and numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(coerce_number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Monthly features
// ---------------------------------------------------------------------------

/// One customer-month row of the monthly features table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowRecord {
    #[serde(rename = "CustomerID")]
    pub customer_id: Option<String>,
    #[serde(rename = "YearMonth")]
    pub year_month: Option<String>,
    #[serde(rename = "MonthlyTotalSpending")]
    pub monthly_total_spending: Option<f64>,
    #[serde(rename = "NumberOfTransactionsPerMonth")]
    pub transactions_per_month: Option<f64>,
    #[serde(rename = "AvgTransactionAmount")]
    pub avg_transaction_amount: Option<f64>,
    #[serde(rename = "WeekendSpendingRatio")]
    pub weekend_spending_ratio: Option<f64>,
}

/// A page of monthly features as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyFeaturesPage {
    pub rows: Vec<RowRecord>,
    pub total_rows: u64,
    pub total_pages: u32,
    pub page_size: u32,
    /// Page the backend says it served, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Default page requested when none is given.
pub const DEFAULT_PAGE: u32 = 1;

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size the backend accepts.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Parameters for `GET /api/monthly-features`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyQuery {
    pub page: u32,
    pub page_size: u32,
    pub customer_id: Option<String>,
    pub year_month: Option<String>,
}

impl Default for MonthlyQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            customer_id: None,
            year_month: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Feature names the prediction endpoint requires, in form order.
pub const PREDICT_FIELDS: [&str; 15] = [
    "AvgTransactionAmount",
    "NumberOfTransactionsPerMonth",
    "MaxMonthlySpend",
    "TotalWeekendSpending",
    "DaysSinceLastTransaction",
    "WeekendSpendingRatio",
    "Age",
    "Income",
    "TotalCASABalance",
    "TotalFixedDepositBalance",
    "TotalLoanOrgAmount",
    "TotalLoanEMIAmount",
    "AvgLoanToIncomeRatio",
    "AvgDebtToIncomeRatio",
    "MonthlyCreditUtilizationRate",
];

/// A validated prediction request: every field in [`PREDICT_FIELDS`] mapped to
/// a finite number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PredictionRequest(BTreeMap<String, f64>);

impl PredictionRequest {
    /// Build a request from already-coerced values. Returns the first missing
    /// field name when the set is incomplete.
    pub fn from_values(values: &BTreeMap<String, f64>) -> Result<Self, &'static str> {
        let mut fields = BTreeMap::new();
        for name in PREDICT_FIELDS {
            let value = values.get(name).copied().ok_or(name)?;
            fields.insert(name.to_string(), value);
        }
        Ok(Self(fields))
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    /// JSON body for `POST /api/predict`.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect(),
        )
    }
}

/// What the prediction endpoint gave back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictionOutcome {
    Score(f64),
    /// The response carried no usable number.
    Invalid,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Response of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn overview_coerces_on_read() {
        let metrics = OverviewMetrics::from_value(json!({
            "total_rows": 600000,
            "mean_monthly_spending": "20000.5",
            "note": "n/a"
        }));
        assert_eq!(metrics.number("total_rows"), Some(600000.0));
        assert_eq!(metrics.number("mean_monthly_spending"), Some(20000.5));
        assert_eq!(metrics.number("note"), None);
        assert_eq!(metrics.number("months_covered"), None);
    }

    #[test]
    fn overview_from_non_object_is_empty() {
        assert!(OverviewMetrics::from_value(json!([1, 2])).is_empty());
    }

    #[test]
    fn prediction_request_requires_every_field() {
        let mut values: BTreeMap<String, f64> =
            PREDICT_FIELDS.iter().map(|f| (f.to_string(), 1.0)).collect();
        let request = PredictionRequest::from_values(&values).unwrap();
        assert_eq!(request.to_json().as_object().unwrap().len(), 15);
        assert_eq!(request.get("Age"), Some(1.0));

        values.remove("Income");
        assert_eq!(PredictionRequest::from_values(&values), Err("Income"));
    }

    #[test]
    fn monthly_query_defaults() {
        let query = MonthlyQuery::default();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 50);
        assert!(query.customer_id.is_none());
    }

    #[test]
    fn health_status_ok_is_case_insensitive() {
        let health = HealthStatus {
            status: "OK".to_string(),
            service: None,
        };
        assert!(health.is_ok());
    }
}
