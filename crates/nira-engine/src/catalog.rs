//! Model catalog: static descriptors with lookup.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Display metadata for one engine-recognized model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Opaque identifier passed to the engine
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Approximate download size in bytes
    #[serde(default)]
    pub approx_size_bytes: u64,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, approx_size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            approx_size_bytes,
        }
    }

    /// Approximate size rendered as `"~700 MB"` (decimal megabytes).
    pub fn size_label(&self) -> String {
        format!("~{} MB", (self.approx_size_bytes + MB / 2) / MB)
    }
}

const MB: u64 = 1_000_000;

/// Immutable, ordered set of models the user can pick from.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
    default_index: usize,
}

impl ModelCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            models: vec![
                ModelDescriptor::new("tinyllama:1.1b", "TinyLlama 1.1B – Fast (Lite)", 700 * MB),
                ModelDescriptor::new("smollm2:360m", "SmolLM 360M – Ultra Lite", 350 * MB),
                ModelDescriptor::new("phi3:mini", "Phi-3 Mini – Balanced", 1600 * MB),
            ],
            default_index: 1,
        }
    }

    /// Build a catalog from configuration.
    ///
    /// `default_id` falls back to the first entry when absent or unknown.
    pub fn from_descriptors(
        models: Vec<ModelDescriptor>,
        default_id: Option<&str>,
    ) -> Result<Self> {
        if models.is_empty() {
            return Err(Error::InvalidConfig("model catalog is empty".into()));
        }
        for (i, m) in models.iter().enumerate() {
            if models[..i].iter().any(|other| other.id == m.id) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate model id in catalog: {}",
                    m.id
                )));
            }
        }
        let default_index = default_id
            .and_then(|id| models.iter().position(|m| m.id == id))
            .unwrap_or(0);
        Ok(Self {
            models,
            default_index,
        })
    }

    /// All models in configuration order
    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Look up a model by exact id
    pub fn find(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::ModelNotFound(id.to_string()))
    }

    /// The preselected model
    pub fn default_model(&self) -> &ModelDescriptor {
        &self.models[self.default_index]
    }

    /// Look up a model, falling back to the default when absent.
    pub fn find_or_default(&self, id: &str) -> &ModelDescriptor {
        match self.find(id) {
            Ok(model) => model,
            Err(_) => {
                tracing::warn!(
                    "Unknown model '{}', falling back to '{}'",
                    id,
                    self.default_model().id
                );
                self.default_model()
            }
        }
    }

    /// Fuzzy lookup: exact id, then id substring, then label substring.
    pub fn search(&self, query: &str) -> Option<&ModelDescriptor> {
        let query_lower = query.to_lowercase();

        if let Some(model) = self.models.iter().find(|m| m.id.to_lowercase() == query_lower) {
            return Some(model);
        }

        if let Some(model) = self
            .models
            .iter()
            .find(|m| m.id.to_lowercase().contains(&query_lower))
        {
            return Some(model);
        }

        self.models
            .iter()
            .find(|m| m.label.to_lowercase().contains(&query_lower))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
