use std::fmt;

use url::Url;

use crate::error::{Error, Result};
use crate::urls::DashboardUrls;

pub const DEFAULT_API_URL: &str = "https://api.commonroom.io/community/v1";

/// Process-wide settings, built once at startup and passed by reference.
#[derive(Clone)]
pub struct Config {
    api_key: String,
    api_url: Url,
    dashboard_base_url: Option<String>,
}

impl Config {
    /// Validate raw settings. A missing or blank API key is fatal; a blank
    /// dashboard base URL counts as unset.
    pub fn new(
        api_key: Option<String>,
        api_url: &str,
        dashboard_base_url: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::configuration("COMMONROOM_KEY environment variable required")
            })?;

        let api_url = Url::parse(api_url.trim()).map_err(|e| {
            Error::configuration(format!("Invalid COMMONROOM_API_URL '{api_url}': {e}"))
        })?;
        if api_url.cannot_be_a_base() || !matches!(api_url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "COMMONROOM_API_URL must be an http(s) URL, got '{api_url}'"
            )));
        }

        let dashboard_base_url = dashboard_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            api_key,
            api_url,
            dashboard_base_url,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn dashboard_base_url(&self) -> Option<&str> {
        self.dashboard_base_url.as_deref()
    }

    pub fn dashboard(&self) -> DashboardUrls<'_> {
        DashboardUrls::new(self.dashboard_base_url())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url.as_str())
            .field("dashboard_base_url", &self.dashboard_base_url)
            .finish()
    }
}
