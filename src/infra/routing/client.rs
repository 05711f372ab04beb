use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::services::routing_api::{MatrixRequest, RoutingEngine};
use transit_access::fetch::HttpClient;
use transit_access::matrix::{TravelTimeMatrix, parse_matrix};

/// Region-wide matrices can take many minutes to compute.
const MATRIX_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Routing engine reached over HTTP.
///
/// The request is POSTed as JSON to `{base_url}/v1/travel-time-matrix`; the
/// service answers with a `from_id,to_id,travel_time` CSV body.
pub struct HttpRoutingEngine<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> HttpRoutingEngine<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn matrix_url(&self) -> String {
        format!("{}/v1/travel-time-matrix", self.base_url)
    }

    fn build_request(&self, request: &MatrixRequest) -> Result<reqwest::Request> {
        let mut req = reqwest::Request::new(reqwest::Method::POST, self.matrix_url().parse()?);
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/csv"));
        *req.timeout_mut() = Some(MATRIX_TIMEOUT);
        *req.body_mut() = Some(serde_json::to_vec(request)?.into());
        Ok(req)
    }
}

#[async_trait]
impl<C: HttpClient> RoutingEngine for HttpRoutingEngine<C> {
    #[tracing::instrument(
        skip(self, request),
        fields(departure = %request.departure, origins = request.origins.len())
    )]
    async fn compute_matrix(&self, request: &MatrixRequest) -> Result<TravelTimeMatrix> {
        let req = self.build_request(request)?;
        let started = Instant::now();

        let response = self
            .client
            .execute(req)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send routing request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Routing engine returned status {}: {}",
                status,
                body
            ));
        }

        let body = response.bytes().await?;
        let matrix = parse_matrix(&body).context("Failed to parse routing engine response")?;

        let elapsed = started.elapsed();
        if matrix.is_empty() {
            warn!("Routing engine returned an empty matrix");
        }
        info!(
            rows = matrix.len(),
            elapsed_secs = elapsed.as_secs(),
            "Travel-time matrix received"
        );
        Ok(matrix)
    }
}
