//! Shared HTTP plumbing for provider adapters.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{ProviderError, ProviderResult};

/// Build a tuned client for one provider.
pub(crate) fn build_client(timeout: Duration, user_agent: Option<&str>) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(user_agent.unwrap_or(concat!("reel-providers/", env!("CARGO_PKG_VERSION"))))
        .build()
        .map_err(ProviderError::Network)
}

/// Pass successful responses through, classify the rest.
pub(crate) async fn check_status(provider: &str, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(300).collect();
    Err(ProviderError::from_http_status(
        status.as_u16(),
        format!("{provider}: {body}"),
    ))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("https://a/v1/", "/chat"), "https://a/v1/chat");
        assert_eq!(join("https://a", "x/y"), "https://a/x/y");
    }
}
