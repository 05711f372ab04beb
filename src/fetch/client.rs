use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request. Wrappers implement this to add credentials.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
