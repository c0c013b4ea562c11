// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_max_output_tokens() -> u32 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only "openai" is wired; anything else falls back to the disabled provider.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY when the client is built.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            base_url: default_base_url(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.trim().to_lowercase();
        if cfg.max_output_tokens == 0 {
            cfg.max_output_tokens = default_max_output_tokens();
        }
        Ok(cfg)
    }

    /// $AI_CONFIG_PATH, then config/ai.json, else defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            return Self::load_from_file(p);
        }
        let p = Path::new(DEFAULT_AI_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        Ok(Self::default())
    }

    /// Resolve the API key, reading the environment when configured as "ENV".
    pub fn resolved_api_key(&self) -> anyhow::Result<String> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(self.api_key.clone());
        }
        match self.provider.as_str() {
            "openai" => env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var")),
            other => anyhow::bail!("Unsupported provider in config: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        fs::write(&p, r#"{ "provider": " OpenAI ", "max_output_tokens": 0 }"#).unwrap();
        let cfg = AiConfig::load_from_file(&p).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.model, "gpt-4.1-mini");
        assert_eq!(cfg.max_output_tokens, 250);
    }

    #[test]
    fn literal_key_is_used_as_is() {
        let cfg = AiConfig {
            api_key: "sk-test".into(),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_api_key().unwrap(), "sk-test");
    }
}
