use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3160
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Answers with fewer words than this are flagged vague.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_breakthrough_min_words")]
    pub breakthrough_min_words: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_vague_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_insight_phrases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_crisis_phrases: Vec<String>,
}

fn default_min_words() -> usize {
    3
}

fn default_breakthrough_min_words() -> usize {
    8
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            breakthrough_min_words: default_breakthrough_min_words(),
            extra_vague_answers: Vec::new(),
            extra_insight_phrases: Vec::new(),
            extra_crisis_phrases: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the identity provider's signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_secret_env() -> String {
    "STEPWORK_AUTH_SECRET".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
        }
    }
}

impl AuthConfig {
    pub fn resolve_secret(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Load `.stepwork/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let Some(data) = crate::io::read_if_exists(&paths::config_path(root))? else {
            return Ok(Self::default());
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::config_path(root), data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();
        if self.classifier.min_words == 0 {
            out.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "classifier.min_words is 0; only listed non-answers will be flagged"
                    .to_string(),
            });
        }
        if self.classifier.breakthrough_min_words < self.classifier.min_words {
            out.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "classifier.breakthrough_min_words ({}) is below min_words ({})",
                    self.classifier.breakthrough_min_words, self.classifier.min_words
                ),
            });
        }
        if self.llm.timeout_secs == 0 {
            out.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "llm.timeout_secs must be greater than 0".to_string(),
            });
        }
        if self.auth.secret_env.trim().is_empty() {
            out.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "auth.secret_env must name an environment variable".to_string(),
            });
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
