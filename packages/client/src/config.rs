use std::time::Duration;

use url::Url;

use crate::error::ClientError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the API lives and where the app navigates on session changes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub login_path: String,
    pub home_path: String,
    pub refresh_path: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }
}
