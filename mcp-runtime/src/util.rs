use std::time::Duration;

use serde_json::Value;

/// Fixed per-request timeout for every upstream call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn client() -> reqwest::Result<reqwest::Client> {
    client_with_timeout(REQUEST_TIMEOUT)
}

/// A client that cannot carry `timeout` is never handed out.
pub fn client_with_timeout(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("commonroom-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn client_enforces_its_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let http = client_with_timeout(Duration::from_millis(100)).unwrap();
        let err = http.get(server.uri()).send().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn default_client_builds() {
        assert!(client().is_ok());
    }
}
