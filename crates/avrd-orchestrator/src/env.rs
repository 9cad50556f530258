//! Provider environment compilation.
//!
//! Turns a provider's stored configuration into the `KEY=VALUE` list its
//! container starts with, applying the provider-specific key rewrites and
//! injecting the identity and port variables every provider receives.

use avrd_store::Provider;
use avrd_types::ProviderType;

/// Ordered, key-addressed environment builder.
///
/// The first insertion of a key fixes its position; a later insertion of
/// the same key overwrites the value in place. This replaces the ambiguity
/// of treating whole `KEY=VALUE` strings as set members, where two values
/// for one key could both reach the container.
#[derive(Debug, Clone, Default)]
pub struct EnvSet {
    entries: Vec<(String, String)>,
}

impl EnvSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key. First-seen order, last-write-wins value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Absorbs caller-supplied `KEY=VALUE` lines. A line without `=` is
    /// treated as a key with an empty value.
    pub fn extend_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            match line.split_once('=') {
                Some((key, value)) => self.set(key, value),
                None => self.set(line, ""),
            }
        }
    }

    /// Current value of a key, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the environment as `KEY=VALUE` lines in insertion order.
    pub fn into_lines(self) -> Vec<String> {
        self.entries
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}

/// The environment shared by every container an agent run starts.
pub fn base_env<'a>(
    agent_id: &str,
    agent_name: &str,
    extra: impl IntoIterator<Item = &'a str>,
) -> EnvSet {
    let mut env = EnvSet::new();
    env.set("AGENT_ID", agent_id);
    env.set("AGENT_NAME", agent_name);
    env.extend_lines(extra);
    env
}

/// Whether a value is a well-formed absolute URL, which switches the
/// instruction variables to their `_URL_` form.
fn is_absolute_url(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

/// Compiles the container environment for one provider.
///
/// Provider env entries pass through on top of `base`, except:
/// - `OPENAI_INSTRUCTIONS` / `GEMINI_INSTRUCTIONS` become their `_URL_`
///   variants when the value is an absolute URL;
/// - `OPENAI_LANGUAGE` is dropped when empty, `NULL`, or `auto`.
///
/// Every provider then receives its identity (`PROVIDER_<TYPE>_ID/NAME/
/// TYPE`) and listening `PORT`; STS and LLM additionally receive `AMI_URL`.
pub fn provider_env(base: &EnvSet, provider: &Provider, port: u16, ami_url: &str) -> EnvSet {
    let mut env = base.clone();

    for (key, value) in &provider.config.env {
        match key.as_str() {
            "OPENAI_INSTRUCTIONS" => {
                if is_absolute_url(value) {
                    env.set("OPENAI_URL_INSTRUCTIONS", value);
                } else {
                    env.set("OPENAI_INSTRUCTIONS", value);
                }
            }
            "GEMINI_INSTRUCTIONS" => {
                if is_absolute_url(value) {
                    env.set("GEMINI_URL_INSTRUCTIONS", value);
                } else {
                    env.set("GEMINI_INSTRUCTIONS", value);
                }
            }
            "OPENAI_LANGUAGE" => {
                if !value.is_empty() && value != "NULL" && value != "auto" {
                    env.set("OPENAI_LANGUAGE", value);
                }
            }
            _ => env.set(key, value),
        }
    }

    let ty = provider.provider_type.as_str();
    env.set(format!("PROVIDER_{ty}_ID"), &provider.id);
    env.set(format!("PROVIDER_{ty}_NAME"), &provider.name);
    env.set(format!("PROVIDER_{ty}_TYPE"), ty);
    env.set("PORT", port.to_string());

    if matches!(provider.provider_type, ProviderType::Sts | ProviderType::Llm) {
        env.set("AMI_URL", ami_url);
    }

    env
}
