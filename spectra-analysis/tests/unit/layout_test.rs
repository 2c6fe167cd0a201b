use super::*;
use crate::profiles::supported_models;

fn llama() -> &'static ModelProfile {
    get_profile("llama").unwrap()
}

mod role_cycle {
    use super::*;

    #[test]
    fn test_llama_reference_positions() {
        let cases = [
            (1, 0, "attn_norm"),
            (2, 0, "attn_q"),
            (9, 0, "ffn_down"),
            (10, 1, "attn_norm"),
            (288, 31, "ffn_down"),
            (289, 998, "output_norm"),
            (290, 999, "output"),
            (5000, 999, "output"),
        ];

        for (position, layer, role) in cases {
            let label = map_position(position, "llama", 32);
            assert_eq!((label.layer, label.role), (layer, role), "position {position}");
            assert!(label.known);
        }
    }

    #[test]
    fn test_role_index_is_reported() {
        let label = map_position(9, "llama", 32);
        assert_eq!(label.type_index, 8);
        assert_eq!(label.category, Category::Feedforward);

        let label = map_position(3, "llama", 32);
        assert_eq!(label.type_index, 2);
        assert_eq!(label.category, Category::Attention);
    }

    #[test]
    fn test_first_position_is_always_embedding() {
        for family in supported_models() {
            for total_layers in [0, 1, 16, 32, 80] {
                let label = map_position(0, family, total_layers);
                assert_eq!(label.layer, EMBEDDING_LAYER);
                assert_eq!(label.role, "token_embd");
                assert_eq!(label.category, Category::Embedding);
                assert!(label.known);
            }
        }
    }

    #[test]
    fn test_unknown_family_is_flagged() {
        for position in [0, 1, 289, 10_000] {
            let label = map_position(position, "gpt-neox", 32);
            assert_eq!(label, PositionLabel::unknown());
            assert_eq!(label.layer, -1);
            assert!(!label.known);
        }
    }

    #[test]
    fn test_layers_stay_in_range() {
        for family in supported_models() {
            for total_layers in [1, 2, 16, 32] {
                let layout = RoleCycleLayout::new(family, total_layers);
                for position in 1..1_000 {
                    let label = layout.label(position);
                    assert_eq!(label, layout.label(position));
                    let in_block = (0..total_layers as i64).contains(&label.layer);
                    assert!(
                        in_block || label.layer == OUTPUT_NORM_LAYER || label.layer == OUTPUT_LAYER,
                        "{family}: position {position} mapped to layer {}",
                        label.layer
                    );
                }
            }
        }
    }

    #[test]
    fn test_fused_qkv_cycle() {
        assert_eq!(map_position(2, "phi", 32).role, "attn_qkv");
        assert_eq!(map_position(7, "phi", 32).layer, 1);
        assert_eq!(map_position(193, "phi", 32).role, "output_norm");
        assert_eq!(map_position(194, "phi", 32).role, "output");
    }

    #[test]
    fn test_zero_layers_goes_straight_to_output() {
        assert_eq!(map_position(1, "llama", 0).layer, OUTPUT_NORM_LAYER);
        assert_eq!(map_position(2, "llama", 0).layer, OUTPUT_LAYER);
    }

    #[test]
    fn test_family_lookup_is_normalized() {
        assert_eq!(map_position(10, " QWEN ", 32), map_position(10, "qwen", 32));
    }
}

mod even_split {
    use super::*;

    #[test]
    fn test_full_graph_matches_role_cycle_rows() {
        let layout = EvenSplitLayout::new(llama(), 32, 291);
        assert_eq!(layout.tensors_per_layer(), 9);

        assert_eq!(layout.label(0).role, "token_embd");
        assert_eq!(layout.label(0).type_index, 0);

        let label = layout.label(1);
        assert_eq!((label.layer, label.role, label.type_index), (0, "attn_norm", 1));

        let label = layout.label(10);
        assert_eq!((label.layer, label.role, label.type_index), (1, "attn_norm", 1));

        let label = layout.label(288);
        assert_eq!((label.layer, label.role), (31, "ffn_down"));

        let label = layout.label(289);
        assert_eq!((label.layer, label.role, label.type_index), (OUTPUT_NORM_LAYER, "output_norm", 0));
        assert_eq!(label.category, Category::Output);

        let label = layout.label(290);
        assert_eq!((label.layer, label.role, label.type_index), (OUTPUT_LAYER, "output", 0));
    }

    #[test]
    fn test_short_sequence_uses_one_tensor_per_layer() {
        let layout = EvenSplitLayout::new(llama(), 32, 10);
        assert_eq!(layout.tensors_per_layer(), 1);

        let label = layout.label(5);
        assert_eq!((label.layer, label.role, label.type_index), (4, "attn_norm", 0));
        assert_eq!(layout.label(8).role, "output_norm");
        assert_eq!(layout.label(9).role, "output");
    }

    #[test]
    fn test_layer_is_capped_at_last_block() {
        let layout = EvenSplitLayout::new(llama(), 5, 14);
        assert_eq!(layout.tensors_per_layer(), 2);

        let label = layout.label(11);
        assert_eq!((label.layer, label.role, label.type_index), (4, "attn_norm", 1));
    }

    #[test]
    fn test_tiny_sequences() {
        let layout = EvenSplitLayout::new(llama(), 32, 1);
        assert_eq!(layout.label(0).role, "token_embd");

        let layout = EvenSplitLayout::new(llama(), 32, 2);
        assert_eq!(layout.label(0).role, "token_embd");
        assert_eq!(layout.label(1).role, "output");

        let layout = EvenSplitLayout::new(llama(), 32, 3);
        assert_eq!(layout.label(1).role, "output_norm");
        assert_eq!(layout.label(2).role, "output");
    }

    #[test]
    fn test_zero_layers_does_not_divide_by_zero() {
        let layout = EvenSplitLayout::new(llama(), 0, 20);
        assert_eq!(layout.tensors_per_layer(), 1);
        assert_eq!(layout.label(5).layer, 0);
    }
}

#[test]
fn test_strategies_are_independent() {
    let role_cycle = RoleCycleLayout::for_profile(llama(), 32);
    let even_split = EvenSplitLayout::new(llama(), 32, 300);
    let strategies: [&dyn LayoutStrategy; 2] = [&role_cycle, &even_split];

    let labels = strategies.map(|strategy| strategy.label(289));
    assert_eq!(labels[0].layer, OUTPUT_NORM_LAYER);
    assert_eq!((labels[1].layer, labels[1].role), (31, "attn_norm"));
}
