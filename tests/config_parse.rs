use docstage::config::Config;
use std::io::Write;

#[test]
fn parse_example_config() {
    let raw = include_str!("../docstage.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(!cfg.paths.out_dir.is_empty());
    assert_eq!(cfg.langid.strategies.len(), 4);
    assert_eq!(cfg.langid.max_alternatives, 3);
    assert_eq!(cfg.evaluation.table_weights, [0.3, 0.7]);
    assert_eq!(cfg.engine.ocr_providers, vec!["easyocr", "trocr"]);
}

#[test]
fn partial_config_fills_defaults() {
    let cfg: Config = toml::from_str("[langid]\nstrategies = [\"pattern\"]\n").expect("parse TOML");
    assert_eq!(cfg.langid.strategies, vec!["pattern"]);
    assert_eq!(cfg.langid.statistical_threshold, 0.7);
    assert_eq!(cfg.langid.max_alternatives, 3);
    assert_eq!(cfg.fallback.template_confidence, 0.5);
    assert_eq!(cfg.output.filename_pattern, "stage{stage}.json");
}

#[test]
fn single_key_sections_parse() {
    let cfg: Config = toml::from_str(
        r#"
        [engine]
        script_timeout_seconds = 5

        [ocr]
        preprocess = false

        [evaluation]
        figure_weights = [0.5, 0.5]
        "#,
    )
    .expect("parse TOML");
    assert_eq!(cfg.engine.script_timeout_seconds, 5);
    assert_eq!(cfg.engine.python_exe, "auto");
    assert!(!cfg.ocr.preprocess);
    assert!(cfg.ocr.normalize_unicode);
    assert_eq!(cfg.evaluation.figure_weights, [0.5, 0.5]);
    assert_eq!(cfg.evaluation.table_weights, [0.3, 0.7]);
}

#[test]
fn load_from_disk_and_hash_is_stable() {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(b"[fallback]\ntemplate_confidence = 0.25\n")
        .expect("write");
    let cfg = Config::load(f.path()).expect("load");
    assert_eq!(cfg.fallback.template_confidence, 0.25);
    assert_eq!(cfg.normalized_for_hash(), cfg.clone().normalized_for_hash());
    assert_ne!(
        cfg.normalized_for_hash(),
        Config::default().normalized_for_hash()
    );
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(Config::load(&dir.path().join("nope.toml")).is_err());
}
