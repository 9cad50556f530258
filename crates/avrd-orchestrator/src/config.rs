//! Operational settings for the orchestrator.
//!
//! Everything here is externally supplied — image references, port ranges,
//! bind directories, call-manager and webhook endpoints — the orchestrator
//! computes none of it.

use serde::Deserialize;

/// An inclusive port range one container role draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    /// Draws a random port from the range.
    pub fn draw(&self) -> u16 {
        use rand::Rng;
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Whether a port falls inside the range.
    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Image for the core container started last on every run.
    #[serde(default = "default_core_image")]
    pub core_image: String,

    /// Call-manager (AMI) URL handed to STS and LLM containers, the only
    /// two roles that need call-control access.
    #[serde(default)]
    pub ami_url: String,

    /// Host directory bind-mounted into provider containers as their
    /// tools directory, when set.
    #[serde(default)]
    pub tools_dir: Option<String>,

    /// Webhook endpoint the core container reports call events to.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Shared secret for the webhook endpoint.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// AudioSocket port range for core containers, assigned at agent
    /// creation and stable afterwards.
    #[serde(default = "default_core_ports")]
    pub core_ports: PortRange,

    /// HTTP port range for core containers.
    #[serde(default = "default_http_ports")]
    pub http_ports: PortRange,

    /// Port range provider containers draw from on every run.
    #[serde(default = "default_provider_ports")]
    pub provider_ports: PortRange,
}

fn default_core_image() -> String {
    "agentvoiceresponse/avr-core:latest".to_string()
}

fn default_core_ports() -> PortRange {
    PortRange {
        min: 5000,
        max: 5999,
    }
}

fn default_http_ports() -> PortRange {
    PortRange {
        min: 7000,
        max: 7999,
    }
}

fn default_provider_ports() -> PortRange {
    PortRange {
        min: 6000,
        max: 6999,
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            core_image: default_core_image(),
            ami_url: String::new(),
            tools_dir: None,
            webhook_url: None,
            webhook_secret: None,
            core_ports: default_core_ports(),
            http_ports: default_http_ports(),
            provider_ports: default_provider_ports(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_stays_in_range() {
        let range = PortRange { min: 6000, max: 6010 };
        for _ in 0..100 {
            assert!(range.contains(range.draw()));
        }
    }

    #[test]
    fn defaults_keep_role_ranges_disjoint() {
        let config = OrchestratorConfig::default();
        assert!(config.core_ports.max < config.provider_ports.min);
        assert!(config.provider_ports.max < config.http_ports.min);
    }
}
