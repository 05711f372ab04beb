use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::info;

use crate::services::tract_api::TractSource;
use transit_access::error::AccessError;
use transit_access::fetch::{BasicClient, fetch_bytes, is_remote};
use transit_access::geometry::{Tract, TractQuery, read_tracts};

/// Census cartographic boundary tracts exported as CSV (WKT geometry plus
/// the `INTPTLAT`/`INTPTLON` interior point columns).
///
/// Reads `location` when given (a local path or an http(s) URL); otherwise
/// `{data_dir}/cb_{year}_{state}_tract_500k.csv`.
pub struct CartographicBoundarySource {
    location: Option<String>,
    data_dir: PathBuf,
}

impl CartographicBoundarySource {
    pub fn new(location: Option<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            location,
            data_dir: data_dir.into(),
        }
    }

    fn resolve(&self, query: &TractQuery) -> String {
        match &self.location {
            Some(location) => location.clone(),
            None => self
                .data_dir
                .join(format!(
                    "cb_{}_{}_tract_500k.csv",
                    query.year, query.state_fips
                ))
                .display()
                .to_string(),
        }
    }

    async fn read_source(source: &str) -> Result<Bytes> {
        if is_remote(source) {
            let client = BasicClient::new()?;
            fetch_bytes(&client, source)
                .await
                .with_context(|| format!("Failed to download tracts from {source}"))
        } else {
            let bytes = tokio::fs::read(source)
                .await
                .map_err(|e| AccessError::from_io(source, e))?;
            Ok(Bytes::from(bytes))
        }
    }
}

#[async_trait]
impl TractSource for CartographicBoundarySource {
    #[tracing::instrument(skip(self), fields(year = query.year, state = %query.state_fips))]
    async fn load_tracts(&self, query: &TractQuery) -> Result<Vec<Tract>> {
        let source = self.resolve(query);
        let bytes = Self::read_source(&source).await?;

        let all = read_tracts(bytes.as_ref(), &source)?;
        let total = all.len();
        let tracts: Vec<Tract> = all.into_iter().filter(|t| query.matches(t)).collect();

        if tracts.is_empty() {
            bail!(
                "No tracts in {} match state {} and counties {:?}",
                source,
                query.state_fips,
                query.county_fips
            );
        }

        info!(source = %source, total, kept = tracts.len(), "Tracts loaded");
        Ok(tracts)
    }
}
