use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use dr_agents::{DriverConfig, PipelineSettings};
use dr_providers::{GeminiProvider, DEFAULT_GEMINI_MODEL};
use dr_research::{CitationStyle, DEFAULT_MAX_SEARCHES};
use dr_tools::{LinkupClient, SearchToolConfig};

/// Effective configuration: defaults, then the config file, then the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Searches allowed per research session
    pub max_searches: u32,
    /// Pause before each search call, in milliseconds
    pub delay_ms: u64,
    pub max_raw_urls: usize,
    pub truncate_chars: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let tool = SearchToolConfig::default();
        Self {
            api_key: None,
            base_url: None,
            max_searches: DEFAULT_MAX_SEARCHES,
            delay_ms: tool.delay.as_millis() as u64,
            max_raw_urls: tool.max_raw_urls,
            truncate_chars: tool.truncate_chars,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub researcher_max_turns: Option<usize>,
    pub writer_max_turns: Option<usize>,
    /// apa, mla or plain
    pub citation_style: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let driver = DriverConfig::default();
        Self {
            max_attempts: driver.max_attempts,
            retry_delay_secs: driver.retry_delay.as_secs(),
            researcher_max_turns: None,
            writer_max_turns: None,
            citation_style: CitationStyle::default().as_str().to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), `.env` and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = match path {
            Some(p) if !p.exists() => anyhow::bail!("Config file not found: {}", p.display()),
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        Self::figment(&path)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Layering used by [`Config::load`]. The conventional `GEMINI_API_KEY` and
    /// `LINKUP_API_KEY` variables fill in keys; `DR_` variables win over everything.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "llm.api_key".into()))
            .merge(Env::raw().only(&["LINKUP_API_KEY"]).map(|_| "search.api_key".into()))
            .merge(Env::prefixed("DR_").split("__"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("deep-researcher"))
    }

    pub fn citation_style(&self) -> CitationStyle {
        CitationStyle::parse(&self.research.citation_style)
    }

    pub fn search_tool_config(&self) -> SearchToolConfig {
        SearchToolConfig {
            delay: Duration::from_millis(self.search.delay_ms),
            max_raw_urls: self.search.max_raw_urls,
            truncate_chars: self.search.truncate_chars,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: Some(self.llm.model.clone()),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            researcher_max_turns: self.research.researcher_max_turns,
            writer_max_turns: self.research.writer_max_turns,
            search: self.search_tool_config(),
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            max_searches: self.search.max_searches,
            max_attempts: self.research.max_attempts,
            retry_delay: Duration::from_secs(self.research.retry_delay_secs),
        }
    }

    pub fn gemini_provider(&self) -> Result<GeminiProvider> {
        let key = self.llm.api_key.clone().unwrap_or_default();
        let mut provider = GeminiProvider::with_timeout(key, Duration::from_secs(self.llm.timeout_secs))
            .context("Gemini API key missing: set GEMINI_API_KEY or [llm].api_key")?
            .with_default_model(self.llm.model.clone());
        if let Some(base_url) = &self.llm.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        Ok(provider)
    }

    pub fn linkup_client(&self) -> Result<LinkupClient> {
        let key = self.search.api_key.clone().unwrap_or_default();
        let mut client = LinkupClient::with_timeout(key, Duration::from_secs(self.search.timeout_secs))
            .context("Linkup API key missing: set LINKUP_API_KEY or [search].api_key")?;
        if let Some(base_url) = &self.search.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(client)
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.llm.api_key = config.llm.api_key.as_deref().map(redact);
        config.search.api_key = config.search.api_key.as_deref().map(redact);
        config
    }
}

fn redact(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
