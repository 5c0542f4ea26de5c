//! Configuration file support

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use nira_engine::{ModelCatalog, ModelDescriptor, SamplingOptions};
use serde::{Deserialize, Serialize};

/// Quick-topic prompt templates shipped with nira, in display order
pub const DEFAULT_TOPICS: &[(&str, &str)] = &[
    ("School", "Explain photosynthesis in very simple words."),
    (
        "College",
        "I am a law student. Explain the basics of contract law in India.",
    ),
    (
        "IT / Coding",
        "Teach me what a 'variable' is in programming, with easy examples.",
    ),
    (
        "UPSC / Govt Exams",
        "Give me a quick summary of the Indian Constitution in points.",
    ),
    (
        "Competitive Exams",
        "Give me 5 tricky aptitude questions with answers for placement exams.",
    ),
];

/// Configuration for nira
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to load at startup
    pub model: Option<String>,
    /// Base URL of the local engine
    pub engine_url: Option<String>,
    /// System prompt for new conversations
    pub system_prompt: Option<String>,
    /// Sampling options for every turn
    pub sampling: Option<SamplingOptions>,
    /// Replaces the built-in model catalog when non-empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelDescriptor>,
    /// Extra or overriding quick topics
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub topics: BTreeMap<String, String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nira")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NIRA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(ModelCatalog::builtin().default_model().id.clone()),
            engine_url: Some(nira_engine::providers::ollama::DEFAULT_BASE_URL.to_string()),
            sampling: Some(SamplingOptions::default()),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// The model catalog: configured models, or the built-in list
    pub fn catalog(&self) -> nira_engine::Result<ModelCatalog> {
        if self.models.is_empty() {
            return Ok(ModelCatalog::builtin());
        }
        ModelCatalog::from_descriptors(self.models.clone(), self.model.as_deref())
    }

    /// The model to load at startup.
    ///
    /// A model named on the command line must exist. A configured model
    /// that is no longer in the catalog falls back to the default.
    pub fn select_model(
        &self,
        catalog: &ModelCatalog,
        requested: Option<&str>,
    ) -> nira_engine::Result<ModelDescriptor> {
        if let Some(id) = requested {
            return catalog.find(id).cloned();
        }
        Ok(match self.model.as_deref() {
            Some(id) => catalog.find_or_default(id).clone(),
            None => catalog.default_model().clone(),
        })
    }

    /// Built-in topics with config overrides applied, then extra topics
    pub fn topics(&self) -> Vec<(String, String)> {
        let mut topics: Vec<(String, String)> = DEFAULT_TOPICS
            .iter()
            .map(|(name, template)| {
                let template = self.topics.get(*name).map_or(*template, |t| t.as_str());
                (name.to_string(), template.to_string())
            })
            .collect();

        for (name, template) in &self.topics {
            if !DEFAULT_TOPICS.iter().any(|(n, _)| n == name) {
                topics.push((name.clone(), template.clone()));
            }
        }
        topics
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# nira configuration file
# Place at ~/.config/nira/config.toml (Linux) or set NIRA_CONFIG_PATH

# Model to load at startup (see `nira --list-models`)
model = "smollm2:360m"

# Local engine (defaults to $OLLAMA_HOST, then http://localhost:11434)
engine_url = "http://localhost:11434"

# System prompt for new conversations (optional)
# system_prompt = "You are a patient tutor."

[sampling]
temperature = 0.7
top_p = 0.95
max_tokens = 1024

# Replace the built-in model list (optional)
# [[models]]
# id = "qwen2.5:0.5b"
# label = "Qwen 2.5 0.5B – Lite"
# approx_size_bytes = 400000000

# Add or override quick topics (optional)
# [topics]
# "IT / Coding" = "Explain recursion with a short Python example."
"#
}
