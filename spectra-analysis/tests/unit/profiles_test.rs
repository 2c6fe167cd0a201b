use super::*;

#[test]
fn test_supported_models_in_catalogue_order() {
    assert_eq!(supported_models(), vec!["llama", "granite", "qwen", "phi", "mistral"]);
}

#[test]
fn test_get_profile_is_case_insensitive_and_trimmed() {
    assert_eq!(get_profile("  LLaMA ").map(|profile| profile.family), Some("llama"));
    assert_eq!(get_profile("Granite").map(|profile| profile.family), Some("granite"));
    assert!(get_profile("gpt2").is_none());
    assert!(get_profile("").is_none());
}

#[test]
fn test_get_layer_count_known_values() {
    assert_eq!(get_layer_count("llama", "7b"), 32);
    assert_eq!(get_layer_count("llama", "70b"), 80);
    assert_eq!(get_layer_count("granite", "20b"), 52);
    assert_eq!(get_layer_count("qwen", "0.5b"), 24);
    assert_eq!(get_layer_count("phi", " Medium "), 40);
    assert_eq!(get_layer_count("mistral", "8X22B"), 56);
}

#[test]
fn test_get_layer_count_falls_back_to_default() {
    assert_eq!(get_layer_count("unknown-family", "7b"), DEFAULT_LAYER_COUNT);
    assert_eq!(get_layer_count("llama", "405b"), DEFAULT_LAYER_COUNT);
    assert_eq!(get_layer_count("", ""), 32);
}

#[test]
fn test_roles_per_layer() {
    assert_eq!(estimate_tensors_per_layer("llama"), 9);
    assert_eq!(estimate_tensors_per_layer("phi"), 6);
    assert_eq!(estimate_tensors_per_layer("nope"), DEFAULT_TENSORS_PER_LAYER);
}

#[test]
fn test_every_role_has_a_category() {
    for family in supported_models() {
        let profile = get_profile(family).unwrap();
        for role in profile.tensor_types {
            assert_ne!(profile.category_of(role), Category::Unknown, "{family}/{role}");
        }
        for (role, _) in profile.special_tensors() {
            assert_ne!(profile.category_of(role), Category::Unknown, "{family}/{role}");
        }
    }
}

#[test]
fn test_category_of() {
    let profile = get_profile("phi").unwrap();
    assert_eq!(profile.category_of("attn_qkv"), Category::Attention);
    assert_eq!(profile.category_of("ffn_gate"), Category::Unknown);
    assert_eq!(profile.category_of("token_embd"), Category::Embedding);
    assert_eq!(profile.category_of("output"), Category::Output);
}

#[test]
fn test_tensor_categories_for_unknown_family_are_empty() {
    assert!(get_tensor_categories("nope").is_empty());
    assert_eq!(get_tensor_categories("llama").len(), 4);
}

#[test]
fn test_special_layers() {
    assert!(is_special_layer(EMBEDDING_LAYER));
    assert!(is_special_layer(OUTPUT_NORM_LAYER));
    assert!(is_special_layer(OUTPUT_LAYER));
    assert!(!is_special_layer(0));
    assert!(!is_special_layer(79));
}

#[test]
fn test_category_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Category::Feedforward).unwrap(), "\"feedforward\"");
    assert_eq!(Category::Feedforward.as_str(), "feedforward");
}
