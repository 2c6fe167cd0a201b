use super::*;
use serde_json::json;
use spectra_capture::{SyntheticEngine, TensorCollector};

fn capture(value: serde_json::Value) -> CaptureFile {
    CaptureFile::from_value(value).unwrap()
}

fn small_capture() -> CaptureFile {
    capture(json!({
        "tool": "spectra-capture 0.1.0",
        "created": "2026-01-05T10:00:00.000000+00:00",
        "model_family": "llama",
        "statistics": {"total_trials": 2, "unique_tensors": 4, "total_callbacks": 16},
        "tensor_order": ["tensor_a", "tensor_b", "tensor_c", "tensor_d"],
        "trials": [
            {"trial_id": 0, "prompt": "first", "tensor_counts": {"tensor_a": 2, "tensor_b": 1}, "tensor_order": ["tensor_a", "tensor_b"]},
            {"trial_id": 1, "prompt": "second", "tensor_counts": {"tensor_a": 1, "tensor_c": 3, "tensor_d": 1}, "tensor_order": ["tensor_a", "tensor_c", "tensor_d"]}
        ]
    }))
}

#[test]
fn test_unknown_family_is_rejected() {
    assert!(matches!(CaptureReport::build(&small_capture(), "bloom", "7b"), Err(SpectraError::UnknownFamily(_))));
}

#[test]
fn test_layers_and_categories() {
    let report = CaptureReport::build(&small_capture(), "llama", "7b").unwrap();
    assert_eq!(report.total_layers, 32);
    assert_eq!(report.trials.len(), 2);
    assert_eq!(report.trials[1].unique_tensors, 3);

    let embedding = report.layer(EMBEDDING_LAYER).unwrap();
    assert_eq!((embedding.roles.clone(), embedding.total_count), (vec!["token_embd"], 3));

    let first = report.layer(0).unwrap();
    assert_eq!(first.roles, vec!["attn_norm", "attn_q", "attn_k"]);
    assert_eq!(first.total_count, 5);
    assert_eq!(report.regular_layers().count(), 1);

    let shares = report.categories.iter().map(|share| (share.category, share.count, share.percent)).collect::<Vec<_>>();
    assert_eq!(shares, vec![(Category::Attention, 5, 62.5), (Category::Embedding, 3, 37.5)]);
    assert_eq!(report.categories[0].color, "#50c878");
}

#[test]
fn test_falls_back_to_first_trial_order_and_trial_count() {
    let report = CaptureReport::build(
        &capture(json!({
            "trials": [
                {"tensor_counts": {"x": 2, "y": 2}, "tensor_order": ["x", "y"]},
                {"tensor_counts": {"x": 1}, "tensor_order": ["x"]}
            ]
        })),
        "qwen",
        "0.5b",
    )
    .unwrap();

    assert_eq!(report.statistics.total_trials, 2);
    assert_eq!(report.total_layers, 24);
    assert_eq!(report.layer(EMBEDDING_LAYER).map(|stats| stats.total_count), Some(3));
    assert_eq!(report.layer(0).map(|stats| stats.roles.clone()), Some(vec!["attn_norm"]));
}

#[test]
fn test_empty_capture() {
    let report = CaptureReport::build(&capture(json!({"tensor_order": []})), "phi", "mini").unwrap();
    assert!(report.layers.is_empty());
    assert!(report.categories.is_empty());

    let rendered = report.to_string();
    assert!(rendered.contains("Layer Count: 32"));
    assert!(rendered.contains("Tool: Unknown"));
    assert!(!rendered.contains("Trial Summary"));
}

#[test]
fn test_rendering_of_a_full_synthetic_capture() -> anyhow::Result<()> {
    let collector = TensorCollector::new("llama");
    let engine = SyntheticEngine::new(32, 9);
    collector.start_trial("Explain the difference between a list and a tuple in one paragraph please.")?;
    engine.run(&collector, 2);
    collector.end_trial("Lists are mutable.")?;

    let report = CaptureReport::build(&collector.serialize()?, "llama", "7b")?;
    assert_eq!(report.regular_layers().count(), 32);
    assert!(report.regular_layers().all(|stats| stats.roles.len() == 9 && stats.total_count == 18));
    assert_eq!(report.layer(OUTPUT_LAYER).map(|stats| stats.total_count), Some(2));

    let rendered = report.to_string();
    assert!(rendered.contains("Embedding (Layer -1):"));
    assert!(rendered.contains("  Layer 2:\n"));
    assert!(rendered.contains("... (26 more layers) ..."));
    assert!(rendered.contains("  Layer 31:\n"));
    assert!(!rendered.contains("  Layer 3:\n"));
    assert!(rendered.contains("Output Norm (Layer 998):"));
    assert!(rendered.contains("Prompt: Explain the difference between a list and a tuple ..."));
    assert!(rendered.contains("feedforward"));
    Ok(())
}
