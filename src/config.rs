//! Analysis settings shared by the CLI subcommands.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::compare::{ColumnScheme, Period};
use crate::error::Result;

pub const DEFAULT_THRESHOLD_MINUTES: u32 = 45;
pub const DEFAULT_MAX_TIME_MINUTES: u32 = 120;
pub const DEFAULT_DEPARTURE_WINDOW_MINUTES: u32 = 120;
pub const DEFAULT_TRACT_YEAR: i32 = 2023;

/// Routing modes understood by the routing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Transit,
    Walk,
}

/// One side of the comparison: the network snapshot and the job data year
/// paired with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub gtfs_path: String,
    pub departure: NaiveDateTime,
    /// LODES year of the job and worker files; drives column labels.
    pub data_year: i32,
}

impl PeriodConfig {
    pub fn network_year(&self) -> i32 {
        self.departure.year()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub osm_path: String,
    pub before: PeriodConfig,
    pub after: PeriodConfig,
    pub threshold_minutes: u32,
    pub max_time_minutes: u32,
    pub departure_window_minutes: u32,
    pub transport_modes: Vec<TransportMode>,
}

fn at_seven_am(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(7, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Weekday morning departure used for the 2017 network.
pub fn default_departure_before() -> NaiveDateTime {
    at_seven_am(2017, 6, 16)
}

/// Weekday morning departure used for the 2025 network.
pub fn default_departure_after() -> NaiveDateTime {
    at_seven_am(2025, 4, 1)
}

impl AnalysisConfig {
    /// Builds a config with the default departures (7am on 2017-06-16 and
    /// 2025-04-01), LODES years 2017 and 2022, a 45 minute threshold and
    /// transit + walk routing.
    pub fn new(osm_path: &str, gtfs_before: &str, gtfs_after: &str) -> Self {
        Self {
            osm_path: osm_path.to_string(),
            before: PeriodConfig {
                gtfs_path: gtfs_before.to_string(),
                departure: default_departure_before(),
                data_year: 2017,
            },
            after: PeriodConfig {
                gtfs_path: gtfs_after.to_string(),
                departure: default_departure_after(),
                data_year: 2022,
            },
            threshold_minutes: DEFAULT_THRESHOLD_MINUTES,
            max_time_minutes: DEFAULT_MAX_TIME_MINUTES,
            departure_window_minutes: DEFAULT_DEPARTURE_WINDOW_MINUTES,
            transport_modes: vec![TransportMode::Transit, TransportMode::Walk],
        }
    }

    pub fn with_threshold(mut self, threshold_minutes: u32) -> Self {
        self.threshold_minutes = threshold_minutes;
        self
    }

    pub fn with_data_years(mut self, before: i32, after: i32) -> Self {
        self.before.data_year = before;
        self.after.data_year = after;
        self
    }

    pub fn column_scheme(&self) -> Result<ColumnScheme> {
        ColumnScheme::new(
            self.threshold_minutes,
            Period::new(self.before.data_year),
            Period::new(self.after.data_year),
        )
    }
}
