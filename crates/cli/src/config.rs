use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use anyhow::Context;
use common::{CatalogEntry, CredentialResolver, EntityKey, Meta, Provider, StaticCatalog, Tier};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::probe::{DEFAULT_INTERVAL_MS, MAX_INTERVAL, MIN_INTERVAL};

pub const DEFAULT_NOTICE_MS: u64 = 2_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interval_ms: u64,
    /// How long transient notices stay on screen.
    pub notice_ms: u64,
    pub providers: Vec<ProviderConfig>,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub key: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub id: String,
    pub label: String,
    pub tier: Tier,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Plain values handed to the probing core and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub interval: Duration,
    pub notice: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            notice_ms: DEFAULT_NOTICE_MS,
            providers: builtin_providers(),
            models: builtin_models(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pulseboard").join("config.toml"))
    }

    /// Loads `path` (or the default location). A missing default file or a
    /// malformed one yields the built-in configuration with a warning; an
    /// explicitly named file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()));
            }
        };
        Ok(Self::parse_or_default(&text, &path))
    }

    fn parse_or_default(text: &str, origin: &Path) -> Self {
        match toml::from_str::<Config>(text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path=%origin.display(), error=%e, "malformed config, using built-in defaults");
                Self::default()
            }
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            interval: Duration::from_millis(self.interval_ms).clamp(MIN_INTERVAL, MAX_INTERVAL),
            notice: Duration::from_millis(self.notice_ms),
        }
    }

    pub fn catalog(&self) -> StaticCatalog {
        let providers = self
            .providers
            .iter()
            .map(|p| Provider {
                key: p.key.clone(),
                name: p.name.clone(),
                url: p.url.clone(),
            })
            .collect();
        let entries = self
            .models
            .iter()
            .map(|m| CatalogEntry {
                key: EntityKey::new(&m.provider, &m.id),
                meta: Meta {
                    label: m.label.clone(),
                    tier: m.tier,
                    score: m.score,
                    context: m.context.clone(),
                },
            })
            .collect();
        StaticCatalog::new(providers, entries)
    }

    /// Inline keys win over environment variables.
    pub fn credentials(&self) -> CredentialStore {
        let base = self
            .providers
            .iter()
            .filter_map(|p| {
                let key = p
                    .api_key
                    .clone()
                    .or_else(|| p.api_key_env.as_ref().and_then(|var| std::env::var(var).ok()))
                    .filter(|k| !k.trim().is_empty())?;
                Some((p.key.clone(), key))
            })
            .collect();
        CredentialStore::new(base)
    }
}

/// Configured credentials plus edits made during this session.
#[derive(Debug, Default)]
pub struct CredentialStore {
    base: HashMap<String, String>,
    /// `None` marks a key cleared for this session.
    overrides: RwLock<HashMap<String, Option<String>>>,
}

impl CredentialStore {
    pub fn new(base: HashMap<String, String>) -> Self {
        Self {
            base,
            overrides: RwLock::default(),
        }
    }

    pub fn set(&self, provider: &str, key: impl Into<String>) {
        let key = key.into();
        let value = (!key.trim().is_empty()).then(|| key.trim().to_string());
        self.write().insert(provider.to_string(), value);
    }

    pub fn clear(&self, provider: &str) {
        self.write().insert(provider.to_string(), None);
    }

    pub fn has_any(&self, providers: &[String]) -> bool {
        providers.iter().any(|p| self.credential(p).is_some())
    }

    /// `abcd…wxyz` style preview, or `—` when unset.
    pub fn masked(&self, provider: &str) -> String {
        match self.credential(provider) {
            None => "—".to_string(),
            Some(key) if key.chars().count() <= 8 => "•".repeat(key.chars().count()),
            Some(key) => {
                let head: String = key.chars().take(4).collect();
                let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
                format!("{head}…{tail}")
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Option<String>>> {
        self.overrides
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialResolver for CredentialStore {
    fn credential(&self, provider: &str) -> Option<String> {
        let overrides = self
            .overrides
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match overrides.get(provider) {
            Some(edited) => edited.clone(),
            None => self.base.get(provider).cloned(),
        }
    }
}

fn provider(key: &str, name: &str, url: &str, env: &str) -> ProviderConfig {
    ProviderConfig {
        key: key.into(),
        name: name.into(),
        url: url.into(),
        api_key_env: Some(env.into()),
        api_key: None,
    }
}

fn builtin_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "nvidia",
            "NVIDIA NIM",
            "https://integrate.api.nvidia.com/v1/chat/completions",
            "NVIDIA_API_KEY",
        ),
        provider(
            "groq",
            "Groq",
            "https://api.groq.com/openai/v1/chat/completions",
            "GROQ_API_KEY",
        ),
        provider(
            "cerebras",
            "Cerebras",
            "https://api.cerebras.ai/v1/chat/completions",
            "CEREBRAS_API_KEY",
        ),
        provider(
            "openrouter",
            "OpenRouter",
            "https://openrouter.ai/api/v1/chat/completions",
            "OPENROUTER_API_KEY",
        ),
    ]
}

fn builtin_models() -> Vec<ModelConfig> {
    let model = |provider: &str, id: &str, label: &str, tier: Tier, score: f32, ctx: &str| ModelConfig {
        provider: provider.into(),
        id: id.into(),
        label: label.into(),
        tier,
        score: Some(score),
        context: Some(ctx.into()),
    };
    vec![
        model("nvidia", "deepseek-ai/deepseek-v3.1", "DeepSeek V3.1", Tier::SPlus, 66.0, "128k"),
        model("nvidia", "moonshotai/kimi-k2-instruct", "Kimi K2", Tier::S, 65.8, "128k"),
        model("nvidia", "qwen/qwen3-coder-480b-a35b-instruct", "Qwen3 Coder 480B", Tier::S, 61.8, "256k"),
        model("nvidia", "openai/gpt-oss-120b", "GPT OSS 120B", Tier::APlus, 52.0, "128k"),
        model("nvidia", "meta/llama-3.3-70b-instruct", "Llama 3.3 70B", Tier::B, 31.0, "128k"),
        model("groq", "moonshotai/kimi-k2-instruct", "Kimi K2", Tier::S, 65.8, "128k"),
        model("groq", "openai/gpt-oss-120b", "GPT OSS 120B", Tier::APlus, 52.0, "128k"),
        model("groq", "llama-3.3-70b-versatile", "Llama 3.3 70B", Tier::B, 31.0, "128k"),
        model("cerebras", "qwen-3-coder-480b", "Qwen3 Coder 480B", Tier::S, 61.8, "128k"),
        model("cerebras", "gpt-oss-120b", "GPT OSS 120B", Tier::APlus, 52.0, "128k"),
        model("cerebras", "llama3.1-8b", "Llama 3.1 8B", Tier::C, 12.0, "32k"),
        model("openrouter", "qwen/qwen3-coder:free", "Qwen3 Coder 480B", Tier::S, 61.8, "262k"),
        model("openrouter", "deepseek/deepseek-chat-v3.1:free", "DeepSeek V3.1", Tier::SPlus, 66.0, "64k"),
        model("openrouter", "mistralai/devstral-small-2505:free", "Devstral Small", Tier::A, 46.8, "32k"),
    ]
}

#[cfg(test)]
mod tests {
    use common::Catalog;

    use super::*;

    const SAMPLE: &str = r#"
interval_ms = 5000

[[providers]]
key = "local"
name = "Local"
url = "http://127.0.0.1:8080/v1/chat/completions"
api_key = "sk-local-123456789"

[[models]]
provider = "local"
id = "tiny"
label = "Tiny"
tier = "A-"
"#;

    #[test]
    fn parses_partial_file_with_defaults() {
        let cfg = Config::parse_or_default(SAMPLE, Path::new("sample.toml"));
        assert_eq!(cfg.interval_ms, 5000);
        assert_eq!(cfg.notice_ms, DEFAULT_NOTICE_MS);
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.models[0].tier, Tier::AMinus);

        let entries = cfg.catalog().entries().unwrap();
        assert_eq!(entries[0].key, EntityKey::new("local", "tiny"));
        assert_eq!(
            cfg.credentials().credential("local").as_deref(),
            Some("sk-local-123456789")
        );
    }

    #[test]
    fn interval_is_held_to_the_live_edit_range() {
        let fast = Config::parse_or_default("interval_ms = 250", Path::new("fast.toml"));
        assert_eq!(fast.settings().interval, MIN_INTERVAL);
        let slow = Config::parse_or_default("interval_ms = 600000", Path::new("slow.toml"));
        assert_eq!(slow.settings().interval, MAX_INTERVAL);
    }

    #[test]
    fn malformed_file_falls_back_to_builtin() {
        let cfg = Config::parse_or_default("interval_ms = [nope", Path::new("bad.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn builtin_catalog_references_known_providers() {
        let cfg = Config::default();
        let keys: Vec<&str> = cfg.providers.iter().map(|p| p.key.as_str()).collect();
        assert!(cfg.models.iter().all(|m| keys.contains(&m.provider.as_str())));
    }

    #[test]
    fn session_edits_override_configured_keys() {
        let store = CredentialStore::new([("groq".to_string(), "gsk_abcdefgh1234".to_string())].into());
        assert_eq!(store.masked("groq"), "gsk_…1234");
        store.clear("groq");
        assert_eq!(store.credential("groq"), None);
        assert!(!store.has_any(&["groq".to_string()]));
        store.set("nvidia", "  nv-key  ");
        assert_eq!(store.credential("nvidia").as_deref(), Some("nv-key"));
        assert_eq!(store.masked("nvidia"), "••••••");
        store.set("nvidia", "   ");
        assert_eq!(store.credential("nvidia"), None);
    }
}
