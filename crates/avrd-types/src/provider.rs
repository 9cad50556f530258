//! Typed provider configuration.
//!
//! A provider row stores a configuration blob describing the container image
//! to run and the environment to hand it. The blob is structured here instead
//! of being an open string map: known fields get compile-time shape checking,
//! while unknown keys survive round-trips through the `extra` escape hatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration carried by every provider, regardless of type.
///
/// `image` is the container image reference. Older rows used `dockerImage`
/// for the same field; both are accepted and `image_ref` resolves the pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Container image reference (e.g. `agentvoiceresponse/avr-asr-deepgram:latest`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Legacy name for `image`. Kept so existing rows keep deserializing.
    #[serde(
        default,
        rename = "dockerImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub docker_image: Option<String>,

    /// Environment handed to the provider container, key to value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Forward-compatibility escape hatch: any key this version does not
    /// model is preserved here verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderConfig {
    /// Resolves the image reference, preferring `image` over the legacy
    /// `dockerImage` field.
    ///
    /// Returns `None` when neither is set; a provider without an image
    /// cannot be run, which is an error at run time, not at save time.
    pub fn image_ref(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or(self.docker_image.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_prefers_image_over_legacy_field() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "image": "avr/asr:1",
            "dockerImage": "avr/asr:0",
        }))
        .unwrap();
        assert_eq!(config.image_ref(), Some("avr/asr:1"));
    }

    #[test]
    fn legacy_docker_image_still_resolves() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "dockerImage": "avr/tts:2",
            "env": { "TTS_KEY": "secret" },
        }))
        .unwrap();
        assert_eq!(config.image_ref(), Some("avr/tts:2"));
        assert_eq!(config.env.get("TTS_KEY").map(String::as_str), Some("secret"));
    }

    #[test]
    fn missing_image_resolves_to_none() {
        let config = ProviderConfig::default();
        assert_eq!(config.image_ref(), None);

        let blank: ProviderConfig =
            serde_json::from_value(serde_json::json!({ "image": "" })).unwrap();
        assert_eq!(blank.image_ref(), None);
    }

    #[test]
    fn unknown_keys_round_trip_through_extra() {
        let value = serde_json::json!({
            "image": "avr/llm:3",
            "model": "gpt-4o-mini",
            "temperature": 0.2,
        });
        let config: ProviderConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(config.extra.get("model").unwrap(), "gpt-4o-mini");

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back, value);
    }
}
