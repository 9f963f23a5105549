use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::fmt;

pub const DEFAULT_GROQ_MODEL: &str = "gemma2-9b-it";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Process environment, read once. Only `main` should touch this; everything
/// else receives an [`LlmConfig`] or [`SearchConfig`] at construction.
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        groq_api_key: get_env_opt(ProviderKind::Groq.api_key_var()),
        groq_model: get_env_or_default("GROQ_MODEL", DEFAULT_GROQ_MODEL),
        groq_base_url: get_env_or_default("GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL),
        tavily_api_key: get_env_opt("TAVILY_API_KEY"),
        tavily_base_url: get_env_or_default("TAVILY_BASE_URL", DEFAULT_TAVILY_BASE_URL),
    }
});

pub struct Config {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: String,
}

impl Config {
    pub fn llm(&self) -> LlmConfig {
        LlmConfig {
            provider: ProviderKind::Groq,
            model: self.groq_model.clone(),
            api_key: self.groq_api_key.clone(),
            base_url: self.groq_base_url.clone(),
        }
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            api_key: self.tavily_api_key.clone(),
            base_url: self.tavily_base_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
}

impl ProviderKind {
    /// Environment variable holding this provider's credential.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Groq => write!(f, "Groq"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Checked lazily: a missing key surfaces on the first completion call.
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
