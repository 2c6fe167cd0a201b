//! Static color and flow tables consumed by the renderer.

use std::collections::BTreeMap;

use crate::profiles::Category;

/// Colors per tensor category, plus the `norm` accent.
pub const TENSOR_COLORS: &[(&str, &str)] = &[
    ("embedding", "#4a90d9"),
    ("attention", "#50c878"),
    ("feedforward", "#ff7f50"),
    ("output", "#da70d6"),
    ("norm", "#ffd700"),
    ("unknown", "#808080"),
];

pub const FLOW_COLORS: &[(&str, &str)] = &[
    ("attention_flow", "#50c878"),
    ("ffn_flow", "#ff7f50"),
    ("layer_flow", "#ffffff"),
    ("output_flow", "#da70d6"),
];

/// Edges between tensor roles, used to draw flow arrows.
pub const TENSOR_FLOWS: &[(&str, &[(&str, &str)])] = &[
    (
        "attention_flow",
        &[
            ("token_embd", "attn_norm"),
            ("attn_norm", "attn_q"),
            ("attn_norm", "attn_k"),
            ("attn_norm", "attn_v"),
            ("attn_q", "attn_output"),
            ("attn_k", "attn_output"),
            ("attn_v", "attn_output"),
        ],
    ),
    (
        "ffn_flow",
        &[
            ("attn_output", "ffn_norm"),
            ("ffn_norm", "ffn_gate"),
            ("ffn_norm", "ffn_up"),
            ("ffn_gate", "ffn_down"),
            ("ffn_up", "ffn_down"),
        ],
    ),
    // residual into the next layer
    ("layer_flow", &[("ffn_down", "attn_norm")]),
    ("output_flow", &[("ffn_down", "output_norm"), ("output_norm", "output")]),
];

const GRID_CATEGORIES: [Category; 5] =
    [Category::Embedding, Category::Attention, Category::Feedforward, Category::Output, Category::Unknown];

impl Category {
    pub fn color(&self) -> &'static str {
        TENSOR_COLORS
            .iter()
            .find(|(name, _)| *name == self.as_str())
            .map(|(_, color)| *color)
            .unwrap_or("#808080")
    }
}

pub fn tensor_colors() -> BTreeMap<&'static str, &'static str> {
    TENSOR_COLORS.iter().copied().collect()
}

pub fn flow_colors() -> BTreeMap<&'static str, &'static str> {
    FLOW_COLORS.iter().copied().collect()
}

/// Category to color map used by the tensor grid (no `norm` entry).
pub fn category_colors() -> BTreeMap<&'static str, &'static str> {
    GRID_CATEGORIES.iter().map(|category| (category.as_str(), category.color())).collect()
}

pub fn tensor_flows() -> BTreeMap<&'static str, Vec<(&'static str, &'static str)>> {
    TENSOR_FLOWS.iter().map(|(name, edges)| (*name, edges.to_vec())).collect()
}
