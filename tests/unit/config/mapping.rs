use super::*;

const MAPPING: &str = r#"{
  "P1": {
    "static_masks": { "10": 50, "30": 70 },
    "sequence_masks": { "20": 10, "30": 5 }
  },
  "P2": { "static_masks": { "1": 1 } }
}"#;

#[test]
fn selects_the_panorama_entry() {
    let mapping = PanoramaMapping::from_json_str(MAPPING, "P2").unwrap();
    assert_eq!(mapping.static_masks.get(&1), Some(&1));
    assert!(mapping.sequence_masks.is_empty());

    let err = PanoramaMapping::from_json_str(MAPPING, "P9").unwrap_err();
    assert!(matches!(err, MaskError::Validation(_)));
}

#[test]
fn sequence_indexes_override_static_ones() {
    let mapping = PanoramaMapping::from_json_str(MAPPING, "P1").unwrap();
    let merged = mapping.merged_indexes();
    assert_eq!(merged.get(&10), Some(&50));
    assert_eq!(merged.get(&20), Some(&10));
    assert_eq!(merged.get(&30), Some(&5));
}

#[test]
fn discovery_keeps_mapped_assets_only() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("P1");
    std::fs::create_dir_all(base.join("P1_20")).unwrap();
    std::fs::create_dir_all(base.join("P1_40")).unwrap();
    for name in ["P1_10.png", "P1_30.bmp", "P1_99.png", "P2_10.png", "P1_10.txt"] {
        std::fs::write(base.join(name), b"").unwrap();
    }

    let mapping = PanoramaMapping::from_json_str(MAPPING, "P1").unwrap();
    let config = discover_config(&AssetLayout::new("P1", &base), &mapping).unwrap();

    assert_eq!(config.name(), DYNAMIC_CONFIG_NAME);
    assert_eq!(config.gray_values(), &[10, 20, 30]);
    assert_eq!(config.index_of(30), Some(5));
}

#[test]
fn discovery_requires_the_panorama_directory() {
    let dir = tempfile::tempdir().unwrap();
    let layout = AssetLayout::new("P1", dir.path().join("missing"));
    let err = discover_config(&layout, &PanoramaMapping::default()).unwrap_err();
    assert!(matches!(err, MaskError::Validation(_)));
}

#[test]
fn load_reads_mapping_and_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let mapping_path = dir.path().join("mask_mapping.json");
    std::fs::write(&mapping_path, MAPPING).unwrap();
    let mapping = PanoramaMapping::load(&mapping_path, "P1").unwrap();
    assert_eq!(mapping.static_masks.len(), 2);

    assert!(PanoramaMapping::load(&dir.path().join("absent.json"), "P1").is_err());

    let configs_path = dir.path().join("masks.json");
    std::fs::write(
        &configs_path,
        r#"[{"name": "a", "gray_values": [1], "gray_indexes": {"1": 3}},
            {"name": "b", "gray_values": [2]}]"#,
    )
    .unwrap();
    let configs = load_mask_configs(&configs_path).unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[1].index_of(2), None);

    std::fs::write(&configs_path, "[]").unwrap();
    assert!(matches!(
        load_mask_configs(&configs_path),
        Err(MaskError::Validation(_))
    ));
}

#[test]
fn trailing_number_reads_the_last_segment() {
    assert_eq!(trailing_number::<u32>("P1_10"), Some(10));
    assert_eq!(trailing_number::<u32>("frame_0007"), Some(7));
    assert_eq!(trailing_number::<u32>("12"), Some(12));
    assert_eq!(trailing_number::<u32>("P1_abc"), None);
}
