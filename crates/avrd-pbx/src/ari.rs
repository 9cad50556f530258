//! Asterisk REST Interface (ARI) client.
//!
//! The control plane only needs one ARI call: asking the switch to reload a
//! module after a config file changed. The client is constructed explicitly
//! and injected where needed; ARI is stateless HTTP with basic auth, so
//! there is no cached connection to manage or invalidate.

use std::time::Duration;

use async_trait::async_trait;

use crate::{PbxError, ReloadModule};

/// Connection settings for the ARI control channel.
#[derive(Clone)]
pub struct AriConfig {
    /// Base URL, e.g. `http://avr-asterisk:8088/ari`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AriConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AriConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            base_url: "http://avr-asterisk:8088/ari".to_string(),
            username: "avr".to_string(),
            password: String::new(),
            timeout_secs: 10,
        }
    }
}

/// HTTP client for the ARI control channel.
#[derive(Debug)]
pub struct AriClient {
    http: reqwest::Client,
    config: AriConfig,
}

impl AriClient {
    pub fn new(config: AriConfig) -> Result<Self, PbxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ReloadModule for AriClient {
    /// `PUT /asterisk/modules/{module}` — reloads one loaded module.
    async fn reload_module(&self, module: &str) -> Result<(), PbxError> {
        let url = format!(
            "{}/asterisk/modules/{module}",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .put(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PbxError::AriStatus {
                module: module.to_string(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let config = AriConfig {
            password: "hunter2".to_string(),
            ..AriConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
