//! Shared types and constants for the AVRD control plane.
//!
//! This crate provides the foundational enums used across all AVRD crates:
//! agent modes and statuses, provider types, container roles, and the typed
//! provider configuration blob.
//!
//! No crate in the workspace depends on anything *except* `avrd-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod provider;

pub use provider::ProviderConfig;

use serde::{Deserialize, Serialize};

/// Name of the Docker network all agent containers are attached to.
pub const CONTAINER_NETWORK: &str = "avr";

/// Fixed application label applied to every container the control plane owns.
pub const APP_LABEL_KEY: &str = "app";

/// Value of the application label.
pub const APP_LABEL_VALUE: &str = "AVR";

/// Optional tenant label key for multi-tenant deployments.
pub const TENANT_LABEL_KEY: &str = "tenant";

/// How an agent composes its speech stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Separate ASR, LLM, and TTS stages.
    #[default]
    Pipeline,
    /// One combined speech-to-speech provider.
    Sts,
}

impl AgentMode {
    /// Returns the canonical string label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Sts => "sts",
        }
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pipeline" => Ok(Self::Pipeline),
            "sts" => Ok(Self::Sts),
            _ => Err(ParseEnumError::new("agent mode", s)),
        }
    }
}

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// No containers are expected to be running.
    #[default]
    Stopped,
    /// The last `run` completed and marked the agent live.
    Running,
}

impl AgentStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            _ => Err(ParseEnumError::new("agent status", s)),
        }
    }
}

/// Backend categories a provider can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderType {
    /// Speech recognition.
    Asr,
    /// Language model.
    Llm,
    /// Speech synthesis.
    Tts,
    /// Combined speech-to-speech.
    Sts,
}

impl ProviderType {
    /// Returns the canonical (uppercase) label, as used in
    /// `PROVIDER_<TYPE>_*` environment variables.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asr => "ASR",
            Self::Llm => "LLM",
            Self::Tts => "TTS",
            Self::Sts => "STS",
        }
    }

    /// The container role a provider of this type fulfils.
    pub fn role(self) -> ContainerRole {
        match self {
            Self::Asr => ContainerRole::Asr,
            Self::Llm => ContainerRole::Llm,
            Self::Tts => ContainerRole::Tts,
            Self::Sts => ContainerRole::Sts,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASR" => Ok(Self::Asr),
            "LLM" => Ok(Self::Llm),
            "TTS" => Ok(Self::Tts),
            "STS" => Ok(Self::Sts),
            _ => Err(ParseEnumError::new("provider type", s)),
        }
    }
}

/// The function a container fulfils for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRole {
    Asr,
    Llm,
    Tts,
    Sts,
    /// The orchestrating core container that bridges PBX audio to providers.
    Core,
}

impl ContainerRole {
    /// Returns the lowercase label used in container names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asr => "asr",
            Self::Llm => "llm",
            Self::Tts => "tts",
            Self::Sts => "sts",
            Self::Core => "core",
        }
    }
}

impl std::fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown enum label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
