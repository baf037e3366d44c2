use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use std::time::Instant;
use tracing::debug;

/// Logs every inventory request with its outcome and latency
pub struct TracingMiddleware;

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                %method,
                %url,
                status = response.status().as_u16(),
                duration_ms,
                "inventory request"
            ),
            Err(e) => debug!(%method, %url, error = %e, duration_ms, "inventory request failed"),
        }

        result
    }
}
