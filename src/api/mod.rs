//! API surface of the analytics backend.
//!
//! Each operation is a thin composition of a path, method and body with the
//! shared [`HttpClient`]; all response-shape ambiguity is resolved by the
//! wrapper and the parsing functions in [`normalize`].
//!
//! | Operation                  | Method | Path                       |
//! |----------------------------|--------|----------------------------|
//! | feature importance         | GET    | `/api/feature-importance`  |
//! | overview metrics           | GET    | `/api/metrics/overview`    |
//! | monthly features (paged)   | GET    | `/api/monthly-features`    |
//! | prediction                 | POST   | `/api/predict`             |
//! | health                     | GET    | `/api/health`              |

pub mod normalize;
pub mod types;

use crate::config::DashboardConfig;
use crate::http::{
    ApiError, CancellationToken, HttpClient, HttpRequest, Method, Transport, UreqTransport,
};
use crate::telemetry::RequestLog;
use crate::telemetry::logger::expand_home;

pub use types::{
    FeatureImportanceItem, HealthStatus, MonthlyFeaturesPage, MonthlyQuery, OverviewMetrics,
    PREDICT_FIELDS, PredictionOutcome, PredictionRequest, RowRecord,
};

pub const FEATURE_IMPORTANCE_PATH: &str = "/api/feature-importance";
pub const OVERVIEW_PATH: &str = "/api/metrics/overview";
pub const MONTHLY_FEATURES_PATH: &str = "/api/monthly-features";
pub const PREDICT_PATH: &str = "/api/predict";
pub const HEALTH_PATH: &str = "/api/health";

/// Client for the dashboard backend.
pub struct DashboardApi<T: Transport> {
    client: HttpClient<T>,
}

impl DashboardApi<UreqTransport> {
    /// Build the production client from the resolved configuration.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let mut client = HttpClient::new(
            &config.api.base_url,
            UreqTransport::new(config.api.timeout_ms),
        );
        if config.logging.enabled
            && let Some(path) = expand_home(&config.logging.path)
        {
            client = client.with_request_log(RequestLog::new(path));
        }
        Self { client }
    }
}

impl<T: Transport> DashboardApi<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            client: HttpClient::new(base_url, transport),
        }
    }

    pub fn with_client(client: HttpClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient<T> {
        &self.client
    }

    /// Feature-importance ranking, normalized and sorted by descending importance.
    pub fn fetch_feature_importance(&self) -> Result<Vec<FeatureImportanceItem>, ApiError> {
        let request = self.client.request(Method::Get, FEATURE_IMPORTANCE_PATH);
        let payload = self.client.send(
            &request,
            "Feature importance request",
            &CancellationToken::new(),
        )?;
        Ok(normalize::normalize_feature_importance(&payload))
    }

    /// Aggregate overview metrics.
    pub fn fetch_overview(&self) -> Result<OverviewMetrics, ApiError> {
        let request = self.client.request(Method::Get, OVERVIEW_PATH);
        let payload = self
            .client
            .send(&request, "Overview request", &CancellationToken::new())?;
        Ok(OverviewMetrics::from_value(payload))
    }

    /// One page of monthly features. Returns [`ApiError::Cancelled`] if `cancel`
    /// fires before the response is handed back.
    pub fn fetch_monthly_features(
        &self,
        query: &MonthlyQuery,
        cancel: &CancellationToken,
    ) -> Result<MonthlyFeaturesPage, ApiError> {
        let request = self.monthly_request(query);
        let payload = self
            .client
            .send(&request, "Monthly features request", cancel)?;
        normalize::parse_monthly_page(&payload, query)
    }

    /// Submit feature values and return the model's score.
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionOutcome, ApiError> {
        let http = self
            .client
            .request(Method::Post, PREDICT_PATH)
            .with_json(request.to_json());
        let payload = self
            .client
            .send(&http, "Prediction request", &CancellationToken::new())?;
        Ok(normalize::extract_prediction(&payload))
    }

    /// Backend liveness.
    pub fn health(&self) -> Result<HealthStatus, ApiError> {
        let request = self.client.request(Method::Get, HEALTH_PATH);
        let payload = self
            .client
            .send(&request, "Health check", &CancellationToken::new())?;
        Ok(normalize::parse_health(&payload))
    }

    fn monthly_request(&self, query: &MonthlyQuery) -> HttpRequest {
        let mut request = self
            .client
            .request(Method::Get, MONTHLY_FEATURES_PATH)
            .with_query("page", query.page)
            .with_query("page_size", query.page_size);

        if let Some(customer_id) = non_blank(query.customer_id.as_deref()) {
            request = request.with_query("customer_id", customer_id);
        }
        if let Some(year_month) = non_blank(query.year_month.as_deref()) {
            request = request.with_query("year_month", year_month);
        }
        request
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
