use serde::{Deserialize, Serialize};

/// The closed set of model-family dialects the core knows how to render
/// prompts for and parse output back from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatFormat {
    ContentOnly,
    Generic,
    MistralNemo,
    Magistral,
    Llama3X,
    Llama3XWithBuiltinTools,
    DeepSeekR1,
    DeepSeekV3_1,
    FunctionaryV3_2,
    FunctionaryV3_1Llama3_1,
    Hermes2Pro,
    CommandR7B,
    FireFunctionV2,
    Granite,
    GptOss,
    SeedOss,
    NemotronV2,
    Apertus,
    Lfm2WithJsonTools,
    Glm4_5,
    MinimaxM2,
    KimiK2,
    Qwen3CoderXml,
    Apriel1_5,
    XiaomiMimo,
    PegSimple,
    PegNative,
    PegConstructed,
}

impl ChatFormat {
    /// Human-readable label, mirroring the teacher's habit of giving every
    /// enum a display name for logs (`src/web/chat/tool_tags.rs` does the
    /// same for `TagPair` categories).
    pub fn label(self) -> &'static str {
        match self {
            ChatFormat::ContentOnly => "Content-only",
            ChatFormat::Generic => "Generic",
            ChatFormat::MistralNemo => "Mistral Nemo",
            ChatFormat::Magistral => "Magistral",
            ChatFormat::Llama3X => "Llama 3.x",
            ChatFormat::Llama3XWithBuiltinTools => "Llama 3.x with builtin tools",
            ChatFormat::DeepSeekR1 => "DeepSeek R1",
            ChatFormat::DeepSeekV3_1 => "DeepSeek V3.1",
            ChatFormat::FunctionaryV3_2 => "Functionary v3.2",
            ChatFormat::FunctionaryV3_1Llama3_1 => "Functionary v3.1 Llama 3.1",
            ChatFormat::Hermes2Pro => "Hermes 2 Pro",
            ChatFormat::CommandR7B => "Command R7B",
            ChatFormat::FireFunctionV2 => "FireFunction v2",
            ChatFormat::Granite => "Granite",
            ChatFormat::GptOss => "GPT-OSS",
            ChatFormat::SeedOss => "Seed-OSS",
            ChatFormat::NemotronV2 => "Nemotron v2",
            ChatFormat::Apertus => "Apertus",
            ChatFormat::Lfm2WithJsonTools => "LFM2 (JSON tools)",
            ChatFormat::Glm4_5 => "GLM 4.5",
            ChatFormat::MinimaxM2 => "MiniMax M2",
            ChatFormat::KimiK2 => "Kimi K2",
            ChatFormat::Qwen3CoderXml => "Qwen3-Coder XML",
            ChatFormat::Apriel1_5 => "Apriel 1.5",
            ChatFormat::XiaomiMimo => "Xiaomi MiMo",
            ChatFormat::PegSimple => "PEG (simple)",
            ChatFormat::PegNative => "PEG (native)",
            ChatFormat::PegConstructed => "PEG (constructed)",
        }
    }
}
