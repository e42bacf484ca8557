/// Total parsing functions from loosely typed JSON to the types in
/// [`super::types`].
///
/// Each function accepts any [`Value`] and either produces a validated record
/// or signals "skip" (`None`). Nothing here panics on unexpected shapes.
use serde_json::{Map, Value};

use super::types::{
    FeatureImportanceItem, HealthStatus, MonthlyFeaturesPage, MonthlyQuery, PredictionOutcome,
    RowRecord,
};
use crate::http::ApiError;

/// Column names the backend may use for the customer identifier.
const CUSTOMER_ID_KEYS: [&str; 4] = ["CustomerID", "CustomerId", "customer_id", "customerID"];

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Coerce a JSON value to a finite number.
///
/// Numbers pass through; strings are trimmed and parsed. Empty strings,
/// booleans, nulls, containers and non-finite results yield `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Coerce a JSON value to display text. Integral numbers drop the `.0`.
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Some(i.to_string()),
            (_, Some(u), _) => Some(u.to_string()),
            (_, _, Some(f)) if f.is_finite() && f.fract() == 0.0 => Some(format!("{f:.0}")),
            (_, _, Some(f)) if f.is_finite() => Some(f.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// First key in `keys` whose value coerces to a non-empty string.
fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(_) => coerce_text(value),
            _ => None,
        })
}

/// First key in `keys` that is present and not null, coerced to a number.
fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
        .and_then(coerce_number)
}

// ---------------------------------------------------------------------------
// Feature importance
// ---------------------------------------------------------------------------

/// Parse one feature-importance item.
///
/// Accepts `name` or `feature` for the label and `importance` or `value` for
/// the score. Items without a usable label or a numeric score are skipped.
pub fn parse_feature_item(value: &Value) -> Option<FeatureImportanceItem> {
    let map = value.as_object()?;
    let name = first_text(map, &["name", "feature"])?;
    let importance = first_number(map, &["importance", "value"])?;
    Some(FeatureImportanceItem { name, importance })
}

/// Normalize a feature-importance payload (`{features: [...]}` or a bare
/// array) into items sorted by descending importance.
pub fn normalize_feature_importance(payload: &Value) -> Vec<FeatureImportanceItem> {
    let items: &[Value] = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("features") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut features: Vec<FeatureImportanceItem> =
        items.iter().filter_map(parse_feature_item).collect();
    features.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    features
}

// ---------------------------------------------------------------------------
// Monthly features
// ---------------------------------------------------------------------------

/// Parse one row of the monthly features table. Non-object rows are skipped;
/// missing or malformed cells become `None`.
pub fn parse_row(value: &Value) -> Option<RowRecord> {
    let map = value.as_object()?;
    let customer_id = CUSTOMER_ID_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(coerce_text);

    Some(RowRecord {
        customer_id,
        year_month: map.get("YearMonth").and_then(coerce_text),
        monthly_total_spending: map.get("MonthlyTotalSpending").and_then(coerce_number),
        transactions_per_month: map
            .get("NumberOfTransactionsPerMonth")
            .and_then(coerce_number),
        avg_transaction_amount: map.get("AvgTransactionAmount").and_then(coerce_number),
        weekend_spending_ratio: map.get("WeekendSpendingRatio").and_then(coerce_number),
    })
}

/// Parse a monthly-features page.
///
/// Missing counters fall back to the requested values; a missing
/// `total_pages` is derived from `total_rows` and the page size. A payload
/// that is not an object is a shape error.
pub fn parse_monthly_page(
    payload: &Value,
    requested: &MonthlyQuery,
) -> Result<MonthlyFeaturesPage, ApiError> {
    let map = payload.as_object().ok_or_else(|| ApiError::Payload {
        context: "monthly features".to_string(),
        reason: "expected a JSON object".to_string(),
    })?;

    let rows: Vec<RowRecord> = match map.get("rows") {
        Some(Value::Array(rows)) => rows.iter().filter_map(parse_row).collect(),
        _ => Vec::new(),
    };

    let page_size = map
        .get("page_size")
        .and_then(coerce_number)
        .filter(|n| *n >= 1.0)
        .map(|n| n as u32)
        .unwrap_or(requested.page_size);

    let total_rows = map
        .get("total_rows")
        .and_then(coerce_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(rows.len() as u64);

    let total_pages = map
        .get("total_pages")
        .and_then(coerce_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
        .unwrap_or_else(|| total_rows.div_ceil(u64::from(page_size.max(1))) as u32);

    let page = map
        .get("page")
        .and_then(coerce_number)
        .filter(|n| *n >= 1.0)
        .map(|n| n as u32);

    Ok(MonthlyFeaturesPage {
        rows,
        total_rows,
        total_pages,
        page_size,
        page,
    })
}

// ---------------------------------------------------------------------------
// Prediction / health
// ---------------------------------------------------------------------------

/// Extract the score from a prediction response.
///
/// Accepts `{prediction: <number|numeric string>}` or a bare number/numeric
/// string. Anything else is [`PredictionOutcome::Invalid`].
pub fn extract_prediction(payload: &Value) -> PredictionOutcome {
    let candidate = match payload {
        Value::Object(map) => map.get("prediction"),
        other => Some(other),
    };
    match candidate.and_then(coerce_number) {
        Some(score) => PredictionOutcome::Score(score),
        None => PredictionOutcome::Invalid,
    }
}

/// Parse `GET /api/health`. Unknown shapes report status `"unknown"`.
pub fn parse_health(payload: &Value) -> HealthStatus {
    match payload {
        Value::Object(map) => HealthStatus {
            status: first_text(map, &["status"]).unwrap_or_else(|| "unknown".to_string()),
            service: first_text(map, &["service"]),
        },
        Value::String(status) if !status.trim().is_empty() => HealthStatus {
            status: status.trim().to_string(),
            service: None,
        },
        _ => HealthStatus {
            status: "unknown".to_string(),
            service: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
