use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ModelKind,
}

pub const DEFAULT_TEXT_MODEL_ID: &str = "openai";
pub const DEFAULT_IMAGE_MODEL_ID: &str = "flux";

pub const TEXT_MODELS: &[ModelInfo] = &[
    ModelInfo { id: "openai", name: "OpenAI GPT-4o mini", kind: ModelKind::Text },
    ModelInfo { id: "openai-fast", name: "OpenAI GPT-4.1 nano", kind: ModelKind::Text },
    ModelInfo { id: "openai-large", name: "OpenAI GPT-4.1", kind: ModelKind::Text },
    ModelInfo { id: "openai-reasoning", name: "OpenAI o4-mini", kind: ModelKind::Text },
    ModelInfo { id: "openai-audio", name: "OpenAI GPT-4o mini audio", kind: ModelKind::Text },
    ModelInfo { id: "mistral", name: "Mistral Small", kind: ModelKind::Text },
    ModelInfo { id: "qwen-coder", name: "Qwen 2.5 Coder", kind: ModelKind::Text },
    ModelInfo { id: "llama", name: "Llama 3.3 70B", kind: ModelKind::Text },
    ModelInfo { id: "deepseek", name: "DeepSeek V3", kind: ModelKind::Text },
    ModelInfo { id: "deepseek-reasoning", name: "DeepSeek R1", kind: ModelKind::Text },
    ModelInfo { id: "gemini", name: "Gemini 2.5 Flash Lite", kind: ModelKind::Text },
];

pub const IMAGE_MODELS: &[ModelInfo] = &[
    ModelInfo { id: "flux", name: "Flux", kind: ModelKind::Image },
    ModelInfo { id: "turbo", name: "Turbo", kind: ModelKind::Image },
    ModelInfo { id: "kontext", name: "Flux Kontext", kind: ModelKind::Image },
    ModelInfo { id: "gptimage", name: "GPT Image", kind: ModelKind::Image },
];

pub fn is_text_model(id: &str) -> bool {
    TEXT_MODELS.iter().any(|m| m.id == id)
}

pub fn is_image_model(id: &str) -> bool {
    IMAGE_MODELS.iter().any(|m| m.id == id)
}

/// Audio-capable models answer single-turn GETs with an audio body, so they
/// are never switched to the structured POST.
pub fn is_audio_model(id: &str) -> bool {
    id.contains("audio")
}
