//! # Server settings
//!
//! Layered with the `config` crate, lowest precedence first:
//!
//! 1. built-in defaults (a development server on `127.0.0.1:8080`);
//! 2. an optional `config.toml` in the working directory;
//! 3. environment variables prefixed `FINANCE`, nested with `__`
//!    (`FINANCE__APP__ENVIRONMENT=production`,
//!    `FINANCE__OAUTH__GOOGLE__CLIENT_ID=...`).
//!
//! A `.env` file is loaded into the environment first via `dotenvy`.
//!
//! OAuth providers are optional; a provider without a block is simply not
//! offered by `/api/auth/oauth/{provider}`.

use config::{Config, ConfigError, Environment as EnvSource, File, FileFormat};
use serde::Deserialize;

/// Deployment environment. Drives the `secure` flag of every auth cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Client route a failed or finished logout lands on.
    pub login_path: String,
    /// Client route a successful social login lands on.
    pub home_path: String,
}

impl App {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for App {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: "127.0.0.1".into(),
            port: 8080,
            login_path: "/login".into(),
            home_path: "/dashboard".into(),
        }
    }
}

/// One OAuth identity provider.
///
/// Endpoints and scopes fall back to the provider's well-known values.
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub userinfo_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuth {
    pub google: Option<Provider>,
    pub github: Option<Provider>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default)]
    pub oauth: OAuth,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("app.environment", "development")?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.login_path", "/login")?
            .set_default("app.home_path", "/dashboard")?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                EnvSource::with_prefix("FINANCE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("oauth.google.scopes")
                    .with_list_parse_key("oauth.github.scopes")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::{remove_var, set_var};

    /// Environment for one test, removed again when dropped.
    struct ScopedEnv(Vec<&'static str>);

    impl ScopedEnv {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                set_var(key, value);
            }
            Self(vars.iter().map(|(key, _)| *key).collect())
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for key in &self.0 {
                remove_var(key);
            }
        }
    }

    #[test]
    fn test_settings() {
        let env = ScopedEnv::set(&[
            ("FINANCE__APP__ENVIRONMENT", "production"),
            ("FINANCE__APP__PORT", "9090"),
            ("FINANCE__OAUTH__GITHUB__CLIENT_ID", "gh-client"),
            ("FINANCE__OAUTH__GITHUB__CLIENT_SECRET", "gh-secret"),
            ("FINANCE__OAUTH__GITHUB__USERINFO_URL", "https://github.example.com/api/user"),
            (
                "FINANCE__OAUTH__GITHUB__REDIRECT_URL",
                "http://localhost:9090/api/auth/oauth/github/callback",
            ),
            ("FINANCE__OAUTH__GITHUB__SCOPES", "read:user,user:email"),
        ]);

        let settings = Settings::new().unwrap();
        println!("Settings = {:?}", settings);
        assert!(settings.app.environment.is_production());
        assert_eq!(settings.app.address(), "127.0.0.1:9090");
        assert_eq!(settings.app.login_path, "/login");
        let github = settings.oauth.github.expect("github block");
        assert_eq!(github.client_id, "gh-client");
        assert_eq!(github.scopes, vec!["read:user", "user:email"]);
        assert_eq!(
            github.userinfo_url.as_deref(),
            Some("https://github.example.com/api/user")
        );
        assert!(github.auth_url.is_none());
        assert!(settings.oauth.google.is_none());

        drop(env);
        let settings = Settings::new().unwrap();
        assert!(!settings.app.environment.is_production());
        assert_eq!(settings.app.address(), "127.0.0.1:8080");
        assert!(settings.oauth.github.is_none());
    }
}
