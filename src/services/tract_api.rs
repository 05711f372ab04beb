//! Trait for sources of census tract geometry.

use anyhow::Result;

use transit_access::geometry::{Tract, TractQuery};

/// Produces tract records (GEOID, county, geometry, interior point) for a
/// state, a set of counties and a vintage year.
#[async_trait::async_trait]
pub trait TractSource: Send + Sync {
    async fn load_tracts(&self, query: &TractQuery) -> Result<Vec<Tract>>;
}
