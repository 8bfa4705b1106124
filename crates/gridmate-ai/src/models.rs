//! Model registry with a public lookup API.

use crate::Model;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

struct ModelEntry {
    id: &'static str,
    name: &'static str,
    reasoning: bool,
    context_window: u32,
    max_tokens: u32,
}

static MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry {
        id: "claude-haiku-4-5-20251001",
        name: "Claude Haiku 4.5",
        reasoning: true,
        context_window: 200_000,
        max_tokens: 64_000,
    },
    ModelEntry {
        id: "claude-sonnet-4-5-20250929",
        name: "Claude Sonnet 4.5",
        reasoning: true,
        context_window: 200_000,
        max_tokens: 64_000,
    },
    ModelEntry {
        id: "claude-opus-4-1-20250805",
        name: "Claude Opus 4.1",
        reasoning: true,
        context_window: 200_000,
        max_tokens: 32_000,
    },
];

impl ModelEntry {
    fn to_model(&self) -> Model {
        Model {
            id: self.id.to_string(),
            name: self.name.to_string(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            reasoning: self.reasoning,
            context_window: self.context_window,
            max_tokens: self.max_tokens,
            headers: Default::default(),
        }
    }
}

/// Look up a model by ID.
pub fn get_model_by_id(id: &str) -> Option<Model> {
    MODEL_ENTRIES
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.to_model())
}

/// Get all registered models.
pub fn get_all_models() -> Vec<Model> {
    MODEL_ENTRIES.iter().map(|e| e.to_model()).collect()
}

/// The default assistant model.
pub fn default_model() -> Model {
    MODEL_ENTRIES[0].to_model()
}

/// Resolve a model by ID, falling back to a custom entry with default limits.
pub fn resolve_model(id: &str) -> Model {
    get_model_by_id(id).unwrap_or_else(|| Model {
        id: id.to_string(),
        name: id.to_string(),
        base_url: ANTHROPIC_BASE_URL.to_string(),
        reasoning: false,
        context_window: 200_000,
        max_tokens: 8_192,
        headers: Default::default(),
    })
}
