//! Static registry of the models this service exposes.
//!
//! The registry maps short, service-chosen keys onto upstream model ids and
//! capability flags. It is built once at startup, validated, and shared
//! read-only with every request handler. Adding a model is a configuration
//! change only.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

/// A single model offered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "key": "gpt-4o-mini",
    "upstreamId": "openai/gpt-4o-mini",
    "displayName": "GPT-4o mini",
    "description": "Small, fast multimodal model for everyday chat",
    "multimodal": true,
    "expectedLatencyHint": "Very fast"
}))]
pub struct ModelDescriptor {
    /// Stable key chosen by this service
    pub key: String,
    /// Identifier understood by the upstream provider
    pub upstream_id: String,
    pub display_name: String,
    pub description: String,
    /// Whether the model accepts image input
    pub multimodal: bool,
    pub expected_latency_hint: String,
}

impl ModelDescriptor {
    pub fn new(
        key: &str,
        upstream_id: &str,
        display_name: &str,
        description: &str,
        multimodal: bool,
        expected_latency_hint: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            upstream_id: upstream_id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            multimodal,
            expected_latency_hint: expected_latency_hint.to_string(),
        }
    }
}

/// On-disk registry format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    default_model: String,
    models: Vec<ModelDescriptor>,
}

/// Immutable, ordered model registry.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
    default_key: String,
}

impl ModelRegistry {
    /// Build a registry, checking that keys are unique, upstream ids are
    /// non-empty and the default key is registered.
    pub fn new(models: Vec<ModelDescriptor>, default_key: impl Into<String>) -> Result<Self> {
        let default_key = default_key.into();

        if models.is_empty() {
            bail!("model registry must contain at least one model");
        }

        let mut index = HashMap::with_capacity(models.len());
        for (position, model) in models.iter().enumerate() {
            if model.key.trim().is_empty() {
                bail!("model at position {} has an empty key", position);
            }
            if model.upstream_id.trim().is_empty() {
                bail!("model '{}' has an empty upstream id", model.key);
            }
            if index.insert(model.key.clone(), position).is_some() {
                bail!("duplicate model key '{}'", model.key);
            }
        }

        if !index.contains_key(&default_key) {
            bail!("default model '{}' is not registered", default_key);
        }

        Ok(Self {
            models,
            index,
            default_key,
        })
    }

    /// The registry shipped with the service.
    pub fn builtin() -> Self {
        let models = vec![
            ModelDescriptor::new(
                "gpt-4o-mini",
                "openai/gpt-4o-mini",
                "GPT-4o mini",
                "Small, fast multimodal model for everyday chat",
                true,
                "Very fast",
            ),
            ModelDescriptor::new(
                "gpt-4o",
                "openai/gpt-4o",
                "GPT-4o",
                "OpenAI flagship model with vision support",
                true,
                "Fast",
            ),
            ModelDescriptor::new(
                "claude-3.5-sonnet",
                "anthropic/claude-3.5-sonnet",
                "Claude 3.5 Sonnet",
                "Strong reasoning and writing, accepts images",
                true,
                "Moderate",
            ),
            ModelDescriptor::new(
                "gemini-flash",
                "google/gemini-flash-1.5",
                "Gemini 1.5 Flash",
                "Low-latency multimodal model with a long context window",
                true,
                "Very fast",
            ),
            ModelDescriptor::new(
                "llama-3.1-70b",
                "meta-llama/llama-3.1-70b-instruct",
                "Llama 3.1 70B Instruct",
                "Open-weights text model",
                false,
                "Moderate",
            ),
            ModelDescriptor::new(
                "mistral-large",
                "mistralai/mistral-large",
                "Mistral Large",
                "Multilingual text model",
                false,
                "Moderate",
            ),
        ];

        // Entries above satisfy every check in `new`.
        Self::new(models, "gpt-4o-mini").expect("built-in model registry is valid")
    }

    /// Load a registry from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model registry: {}", path.display()))?;
        let file: RegistryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model registry: {}", path.display()))?;
        Self::new(file.models, file.default_model)
            .with_context(|| format!("Invalid model registry: {}", path.display()))
    }

    /// Load from `path` when given, otherwise use the built-in registry.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&ModelDescriptor> {
        self.index.get(key).map(|&position| &self.models[position])
    }

    /// All models in insertion order.
    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Every registered key, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.models.iter().map(|m| m.key.clone()).collect()
    }

    pub fn log_models(&self) {
        tracing::info!(
            "Model registry loaded with {} models (default: {})",
            self.models.len(),
            self.default_key
        );
        for model in &self.models {
            tracing::info!(
                "  - {} -> {}{}",
                model.key,
                model.upstream_id,
                if model.multimodal { " (multimodal)" } else { "" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn descriptor(key: &str, upstream_id: &str) -> ModelDescriptor {
        ModelDescriptor::new(key, upstream_id, key, "test model", false, "Fast")
    }

    #[test]
    fn test_builtin_lookup_has_upstream_ids() {
        let registry = ModelRegistry::builtin();
        for model in registry.list() {
            let found = registry.lookup(&model.key).unwrap();
            assert!(!found.upstream_id.is_empty());
        }
    }

    #[test]
    fn test_builtin_default_exists() {
        let registry = ModelRegistry::builtin();
        assert!(registry.lookup(registry.default_key()).is_some());
    }

    #[test]
    fn test_lookup_unknown_key() {
        let registry = ModelRegistry::builtin();
        assert!(registry.lookup("does-not-exist").is_none());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = ModelRegistry::new(
            vec![
                descriptor("zeta", "z/1"),
                descriptor("alpha", "a/1"),
                descriptor("mid", "m/1"),
            ],
            "alpha",
        )
        .unwrap();

        let keys: Vec<&str> = registry.list().iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.keys(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let err = ModelRegistry::new(vec![descriptor("a", "x/1"), descriptor("a", "x/2")], "a")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_empty_upstream_id() {
        assert!(ModelRegistry::new(vec![descriptor("a", "  ")], "a").is_err());
    }

    #[test]
    fn test_rejects_missing_default() {
        let err = ModelRegistry::new(vec![descriptor("a", "x/1")], "b").unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_rejects_empty_registry() {
        assert!(ModelRegistry::new(vec![], "a").is_err());
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let json = serde_json::to_value(descriptor("a", "x/1")).unwrap();
        assert_eq!(json["upstreamId"], "x/1");
        assert_eq!(json["displayName"], "a");
        assert_eq!(json["expectedLatencyHint"], "Fast");
        assert!(json.get("upstream_id").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "defaultModel": "vision",
                "models": [
                    {
                        "key": "vision",
                        "upstreamId": "vendor/vision-1",
                        "displayName": "Vision",
                        "description": "sees things",
                        "multimodal": true,
                        "expectedLatencyHint": "Fast"
                    }
                ]
            }"#,
        )
        .unwrap();
        file.flush().unwrap();

        let registry = ModelRegistry::load(file.path().to_str()).unwrap();
        assert_eq!(registry.default_key(), "vision");
        assert!(registry.lookup("vision").unwrap().multimodal);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(ModelRegistry::load(Some("/nonexistent/registry.json")).is_err());
    }

    #[test]
    fn test_load_without_path_uses_builtin() {
        let registry = ModelRegistry::load(None).unwrap();
        assert_eq!(registry.list(), ModelRegistry::builtin().list());
    }
}
