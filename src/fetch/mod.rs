//! HTTP access behind a small client trait, so requests can be decorated
//! (e.g. with an API key) without touching call sites.

pub mod auth;
mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use bytes::Bytes;

/// Returns `true` when `source` should be fetched over HTTP rather than read
/// from disk.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Issues a GET and returns the body, failing on non-success statuses.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://www2.census.gov/tracts.csv"));
        assert!(is_remote("http://localhost:8080/tracts.csv"));
        assert!(!is_remote("data/raw/cb_2023_48_tract_500k.csv"));
        assert!(!is_remote("httpdata/tracts.csv"));
    }
}
