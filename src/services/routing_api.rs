//! Trait and request types for the external routing engine.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;

use transit_access::config::{AnalysisConfig, PeriodConfig, TransportMode};
use transit_access::geometry::Origin;
use transit_access::matrix::TravelTimeMatrix;

/// Street network plus the transit schedules to route over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportNetwork {
    pub osm_path: String,
    pub transit_feeds: Vec<String>,
}

/// One travel-time matrix computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRequest {
    pub network: TransportNetwork,
    pub origins: Vec<Origin>,
    pub destinations: Vec<Origin>,
    pub departure: NaiveDateTime,
    pub max_time_minutes: u32,
    pub departure_time_window_minutes: u32,
    pub transport_modes: Vec<TransportMode>,
}

impl MatrixRequest {
    /// Tract-to-tract request for one period: every origin is also a
    /// destination.
    pub fn for_period(config: &AnalysisConfig, period: &PeriodConfig, origins: &[Origin]) -> Self {
        Self {
            network: TransportNetwork {
                osm_path: config.osm_path.clone(),
                transit_feeds: vec![period.gtfs_path.clone()],
            },
            origins: origins.to_vec(),
            destinations: origins.to_vec(),
            departure: period.departure,
            max_time_minutes: config.max_time_minutes,
            departure_time_window_minutes: config.departure_window_minutes,
            transport_modes: config.transport_modes.clone(),
        }
    }
}

/// Abstraction over a multi-modal routing engine (e.g. an R5 service).
#[async_trait::async_trait]
pub trait RoutingEngine: Send + Sync {
    /// Computes travel times between every origin and destination.
    async fn compute_matrix(&self, request: &MatrixRequest) -> Result<TravelTimeMatrix>;
}
