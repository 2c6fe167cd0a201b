#[cfg(test)]
#[path = "../tests/unit/profiles_test.rs"]
mod profiles_test;

use serde::Serialize;

/// Layer count used when the family or size is not in the catalogue.
pub const DEFAULT_LAYER_COUNT: usize = 32;

/// Tensors-per-layer estimate for families without a profile.
pub const DEFAULT_TENSORS_PER_LAYER: usize = 9;

/// Sentinel layer of the token embedding, before layer 0.
pub const EMBEDDING_LAYER: i64 = -1;
/// Sentinel layer of the final normalization.
pub const OUTPUT_NORM_LAYER: i64 = 998;
/// Sentinel layer of the output projection (logits).
pub const OUTPUT_LAYER: i64 = 999;

pub const TOKEN_EMBD: &str = "token_embd";
pub const OUTPUT_NORM: &str = "output_norm";
pub const OUTPUT: &str = "output";

/// Returns true for sentinel layer numbers that are not transformer blocks.
pub fn is_special_layer(layer: i64) -> bool {
    layer < 0 || layer >= 900
}

/// Visual grouping of tensor roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Embedding,
    Attention,
    Feedforward,
    Output,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Embedding => "embedding",
            Category::Attention => "attention",
            Category::Feedforward => "feedforward",
            Category::Output => "output",
            Category::Unknown => "unknown",
        }
    }
}

/// Static description of one model family's tensor layout.
#[derive(Debug)]
pub struct ModelProfile {
    pub family: &'static str,
    pub description: &'static str,
    pub variants: &'static [&'static str],
    /// Size label to number of transformer layers.
    pub layer_counts: &'static [(&'static str, usize)],
    /// Roles evaluated once per layer, in execution order.
    pub tensor_types: &'static [&'static str],
    pub categories: &'static [(Category, &'static [&'static str])],
    pub notes: Option<&'static str>,
}

impl ModelProfile {
    pub fn roles_per_layer(&self) -> usize {
        self.tensor_types.len()
    }

    /// Case-insensitive, trimmed lookup in the size table.
    pub fn layer_count(&self, size: &str) -> Option<usize> {
        let size = size.trim().to_lowercase();
        self.layer_counts.iter().find(|(label, _)| *label == size).map(|(_, layers)| *layers)
    }

    pub fn category_of(&self, role: &str) -> Category {
        self.categories
            .iter()
            .find(|(_, roles)| roles.iter().any(|candidate| *candidate == role))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Unknown)
    }

    /// Roles outside the per-layer cycle and their sentinel layers.
    pub fn special_tensors(&self) -> [(&'static str, i64); 3] {
        [(TOKEN_EMBD, EMBEDDING_LAYER), (OUTPUT_NORM, OUTPUT_NORM_LAYER), (OUTPUT, OUTPUT_LAYER)]
    }
}

const SEPARATE_QKV_ROLES: &[&str] = &[
    "attn_norm",
    "attn_q",
    "attn_k",
    "attn_v",
    "attn_output",
    "ffn_norm",
    "ffn_gate",
    "ffn_up",
    "ffn_down",
];

const SEPARATE_QKV_CATEGORIES: &[(Category, &[&str])] = &[
    (Category::Embedding, &[TOKEN_EMBD]),
    (Category::Attention, &["attn_norm", "attn_q", "attn_k", "attn_v", "attn_output"]),
    (Category::Feedforward, &["ffn_norm", "ffn_gate", "ffn_up", "ffn_down"]),
    (Category::Output, &[OUTPUT_NORM, OUTPUT]),
];

const FUSED_QKV_ROLES: &[&str] = &["attn_norm", "attn_qkv", "attn_output", "ffn_norm", "ffn_up", "ffn_down"];

const FUSED_QKV_CATEGORIES: &[(Category, &[&str])] = &[
    (Category::Embedding, &[TOKEN_EMBD]),
    (Category::Attention, &["attn_norm", "attn_qkv", "attn_output"]),
    (Category::Feedforward, &["ffn_norm", "ffn_up", "ffn_down"]),
    (Category::Output, &[OUTPUT_NORM, OUTPUT]),
];

static MODEL_PROFILES: [ModelProfile; 5] = [
    ModelProfile {
        family: "llama",
        description: "Llama / Llama 2 / Llama 3 (Meta)",
        variants: &[
            "llama-7b",
            "llama-13b",
            "llama-2-7b",
            "llama-2-13b",
            "llama-3-8b",
            "llama-3.1-8b",
            "llama-3.2-1b",
            "llama-3.2-3b",
        ],
        layer_counts: &[("1b", 16), ("3b", 28), ("7b", 32), ("8b", 32), ("13b", 40), ("70b", 80)],
        tensor_types: SEPARATE_QKV_ROLES,
        categories: SEPARATE_QKV_CATEGORIES,
        notes: None,
    },
    ModelProfile {
        family: "granite",
        description: "Granite (IBM)",
        variants: &["granite-3b", "granite-8b", "granite-20b", "granite-3-2b", "granite-3-8b"],
        layer_counts: &[("2b", 24), ("3b", 32), ("8b", 32), ("20b", 52)],
        tensor_types: SEPARATE_QKV_ROLES,
        categories: SEPARATE_QKV_CATEGORIES,
        notes: None,
    },
    ModelProfile {
        family: "qwen",
        description: "Qwen / Qwen 2 (Alibaba)",
        variants: &["qwen-7b", "qwen-14b", "qwen2-0.5b", "qwen2-1.5b", "qwen2-7b", "qwen2.5-7b", "qwen2.5-14b"],
        layer_counts: &[("0.5b", 24), ("1.5b", 28), ("7b", 32), ("14b", 40), ("72b", 80)],
        tensor_types: SEPARATE_QKV_ROLES,
        categories: SEPARATE_QKV_CATEGORIES,
        notes: None,
    },
    ModelProfile {
        family: "phi",
        description: "Phi / Phi-2 / Phi-3 (Microsoft)",
        variants: &["phi-2", "phi-3-mini", "phi-3-small", "phi-3-medium"],
        layer_counts: &[("phi-2", 32), ("mini", 32), ("small", 32), ("medium", 40)],
        tensor_types: FUSED_QKV_ROLES,
        categories: FUSED_QKV_CATEGORIES,
        notes: Some("Phi uses fused QKV projection (attn_qkv) instead of separate Q, K, V"),
    },
    ModelProfile {
        family: "mistral",
        description: "Mistral / Mixtral (Mistral AI)",
        variants: &["mistral-7b", "mixtral-8x7b", "mixtral-8x22b"],
        layer_counts: &[("7b", 32), ("8x7b", 32), ("8x22b", 56)],
        tensor_types: SEPARATE_QKV_ROLES,
        categories: SEPARATE_QKV_CATEGORIES,
        notes: Some("Mixtral variants use Mixture of Experts (MoE) in FFN layers"),
    },
];

/// Family names in catalogue order.
pub fn supported_models() -> Vec<&'static str> {
    MODEL_PROFILES.iter().map(|profile| profile.family).collect()
}

/// Case-insensitive, trimmed lookup. Absence is a normal outcome, not an error.
pub fn get_profile(family: &str) -> Option<&'static ModelProfile> {
    let family = family.trim().to_lowercase();
    MODEL_PROFILES.iter().find(|profile| profile.family == family)
}

/// Layer count for a family and size, falling back to [`DEFAULT_LAYER_COUNT`].
pub fn get_layer_count(family: &str, size: &str) -> usize {
    get_profile(family).and_then(|profile| profile.layer_count(size)).unwrap_or(DEFAULT_LAYER_COUNT)
}

pub fn get_tensor_categories(family: &str) -> &'static [(Category, &'static [&'static str])] {
    get_profile(family).map(|profile| profile.categories).unwrap_or_default()
}

pub fn estimate_tensors_per_layer(family: &str) -> usize {
    get_profile(family).map(ModelProfile::roles_per_layer).unwrap_or(DEFAULT_TENSORS_PER_LAYER)
}
