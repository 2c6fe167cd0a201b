#[cfg(test)]
#[path = "../tests/unit/layout_test.rs"]
mod layout_test;

use serde::Serialize;

use crate::profiles::{
    Category, EMBEDDING_LAYER, ModelProfile, OUTPUT, OUTPUT_LAYER, OUTPUT_NORM, OUTPUT_NORM_LAYER, TOKEN_EMBD,
    get_profile,
};

/// Architectural position assigned to one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionLabel {
    /// Transformer layer, or one of the sentinel layers.
    pub layer: i64,
    #[serde(rename = "type")]
    pub role: &'static str,
    pub type_index: usize,
    pub category: Category,
    /// False when the family has no profile. Layer -1 alone cannot tell this apart
    /// from the embedding.
    pub known: bool,
}

impl PositionLabel {
    pub fn unknown() -> Self {
        Self { layer: EMBEDDING_LAYER, role: "unknown", type_index: 0, category: Category::Unknown, known: false }
    }

    fn special(profile: &ModelProfile, layer: i64, role: &'static str) -> Self {
        Self { layer, role, type_index: 0, category: profile.category_of(role), known: true }
    }
}

/// Maps a 0-based position in an observation sequence to an architectural label.
///
/// Implementations are heuristics over a regular execution order. Architectures with
/// fused projections, expert branching or reordering silently mis-map.
pub trait LayoutStrategy {
    fn label(&self, position: usize) -> PositionLabel;
}

/// Embedding first, then the family's role cycle once per layer, then output norm and
/// output. Every position past the output norm collapses onto the output.
#[derive(Debug, Clone, Copy)]
pub struct RoleCycleLayout {
    profile: Option<&'static ModelProfile>,
    total_layers: usize,
}

impl RoleCycleLayout {
    pub fn new(family: &str, total_layers: usize) -> Self {
        Self { profile: get_profile(family), total_layers }
    }

    pub fn for_profile(profile: &'static ModelProfile, total_layers: usize) -> Self {
        Self { profile: Some(profile), total_layers }
    }
}

impl LayoutStrategy for RoleCycleLayout {
    fn label(&self, position: usize) -> PositionLabel {
        let Some(profile) = self.profile else {
            return PositionLabel::unknown();
        };

        if position == 0 {
            return PositionLabel::special(profile, EMBEDDING_LAYER, TOKEN_EMBD);
        }

        let roles_per_layer = profile.roles_per_layer();
        if roles_per_layer == 0 {
            return PositionLabel::unknown();
        }

        let adjusted = position - 1;
        let layer = adjusted / roles_per_layer;
        let role_index = adjusted % roles_per_layer;

        if layer >= self.total_layers {
            let extra = adjusted - self.total_layers * roles_per_layer;
            return match extra {
                0 => PositionLabel::special(profile, OUTPUT_NORM_LAYER, OUTPUT_NORM),
                _ => PositionLabel::special(profile, OUTPUT_LAYER, OUTPUT),
            };
        }

        let role = profile.tensor_types[role_index];
        PositionLabel {
            layer: layer as i64,
            role,
            type_index: role_index,
            category: profile.category_of(role),
            known: true,
        }
    }
}

/// Maps an observation index with the role-cycle layout.
pub fn map_position(position: usize, family: &str, total_layers: usize) -> PositionLabel {
    RoleCycleLayout::new(family, total_layers).label(position)
}

/// Grid layout: splits the observed sequence evenly across the layers.
///
/// Tensors per layer is `observations / layers` (at least 1) rather than the role
/// cycle length. The first observation is the embedding and the last two are the output
/// norm and output, whatever their count.
#[derive(Debug, Clone, Copy)]
pub struct EvenSplitLayout {
    profile: &'static ModelProfile,
    total_layers: usize,
    observation_count: usize,
    tensors_per_layer: usize,
}

impl EvenSplitLayout {
    pub fn new(profile: &'static ModelProfile, total_layers: usize, observation_count: usize) -> Self {
        let tensors_per_layer = observation_count.checked_div(total_layers).unwrap_or_default().max(1);
        Self { profile, total_layers, observation_count, tensors_per_layer }
    }

    pub fn tensors_per_layer(&self) -> usize {
        self.tensors_per_layer
    }
}

impl LayoutStrategy for EvenSplitLayout {
    fn label(&self, position: usize) -> PositionLabel {
        let profile = self.profile;

        if position == 0 {
            return PositionLabel::special(profile, EMBEDDING_LAYER, TOKEN_EMBD);
        }

        if position + 2 >= self.observation_count {
            return if position + 2 == self.observation_count {
                PositionLabel::special(profile, OUTPUT_NORM_LAYER, OUTPUT_NORM)
            } else {
                PositionLabel::special(profile, OUTPUT_LAYER, OUTPUT)
            };
        }

        let adjusted = position - 1;
        let layer = (adjusted / self.tensors_per_layer).min(self.total_layers.saturating_sub(1));
        let type_index = adjusted % self.tensors_per_layer;

        let (role, category) = match profile.tensor_types.len() {
            0 => ("unknown", Category::Unknown),
            roles => {
                let role = profile.tensor_types[type_index % roles];
                (role, profile.category_of(role))
            }
        };

        PositionLabel {
            layer: layer as i64,
            role,
            // Index within the grid row, counted from the unadjusted position.
            type_index: position % self.tensors_per_layer,
            category,
            known: true,
        }
    }
}
