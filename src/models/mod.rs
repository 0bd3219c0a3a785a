//! Model catalog and selection.

pub mod selector;

pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Model forced for web-search turns; it returns citations.
pub const SEARCH_MODEL: &str = "perplexity/sonar";
pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_IMAGE_MODEL: &str = "google/imagen-4.0-generate-001";

/// What a catalog model can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    Text,
    Vision,
    Reasoning,
    ChainOfThought,
    ToolCalling,
    Coding,
    Fast,
    ImageGeneration,
}

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// Selector sent back as `model` in chat requests.
    pub value: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
}

impl ModelInfo {
    fn new(name: &str, value: &str, provider: &str, capabilities: &[Capability]) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            provider: provider.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// The models offered to clients, in display order.
pub fn catalog() -> Vec<ModelInfo> {
    use Capability::*;
    vec![
        ModelInfo::new(
            "GPT 4o",
            "openai/gpt-4o",
            "openai",
            &[Vision, Reasoning, ChainOfThought, ToolCalling],
        ),
        ModelInfo::new(
            "Deepseek R1",
            "deepseek/deepseek-r1",
            "deepseek",
            &[Reasoning, ChainOfThought],
        ),
        ModelInfo::new(
            "OpenAI GPT-OSS-120B",
            "openai/gpt-oss-120b",
            "openai",
            &[Text, Reasoning, ChainOfThought, ToolCalling],
        ),
        ModelInfo::new(
            "Meta Llama 4 Scout",
            "meta/llama-4-scout",
            "meta",
            &[Vision, Reasoning, ChainOfThought, ToolCalling],
        ),
        ModelInfo::new(
            "Vercel V0-1.5-MD",
            "vercel/v0-1.5-md",
            "vercel",
            &[Reasoning, ChainOfThought, Coding],
        ),
        ModelInfo::new(
            "xAI Grok-2 Vision",
            "xai/grok-2-vision",
            "xai",
            &[Vision, Reasoning, ChainOfThought],
        ),
        ModelInfo::new(
            "xAI Grok-4.1 Fast Reasoning",
            "xai/grok-4.1-fast-reasoning",
            "xai",
            &[Reasoning, ChainOfThought, Fast],
        ),
        ModelInfo::new(
            "OpenAI GPT-5.2",
            "openai/gpt-5.2",
            "openai",
            &[Vision, Reasoning, ChainOfThought, ToolCalling],
        ),
        ModelInfo::new(
            "Google Imagen 4.0",
            DEFAULT_IMAGE_MODEL,
            "google",
            &[ImageGeneration],
        ),
    ]
}

/// Look up a catalog entry by its selector value.
pub fn find(value: &str) -> Option<ModelInfo> {
    catalog().into_iter().find(|m| m.value == value)
}
