#![cfg(unix)]

use docstage::{
    config::Config,
    engine::{
        python::{PythonEngine, ScriptProvider},
        BBox, LanguageClassifier, OcrReader, RegionImage,
    },
    pipeline::language_identifier,
};
use image::{Rgb, RgbImage};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

/// A stand-in interpreter: logs each launch, then answers every request line
/// with a fixed reply for the script it was started on.
const FAKE_INTERPRETER: &str = r#"#!/bin/sh
echo "$1" >> "$LAUNCH_LOG"
case "$1" in
  *ocr_easyocr.py) reply='{"ok":true,"result":[{"polygon":[[0,0],[5,0],[5,5],[0,5]],"text":"hi","confidence":0.9}]}' ;;
  *) reply='{"ok":true,"result":[["en",0.95]]}' ;;
esac
while IFS= read -r line; do
  echo "$reply"
done
"#;

fn engine_in(dir: &Path) -> Arc<PythonEngine> {
    let scripts = dir.join("scripts");
    std::fs::create_dir_all(&scripts).expect("scripts dir");
    for name in ["langid_classify.py", "langdetect_classify.py", "ocr_easyocr.py"] {
        std::fs::write(scripts.join(name), "").expect("script");
    }
    let interpreter = dir.join("python");
    std::fs::write(&interpreter, FAKE_INTERPRETER).expect("interpreter");
    std::fs::set_permissions(&interpreter, std::fs::Permissions::from_mode(0o755))
        .expect("chmod");

    let mut cfg = Config::default();
    cfg.paths.scripts_dir = scripts.display().to_string();
    cfg.paths.work_dir = dir.join("work").display().to_string();
    cfg.engine.python_exe = interpreter.display().to_string();
    cfg.engine.script_timeout_seconds = 10;
    cfg.engine.env.insert(
        "LAUNCH_LOG".into(),
        dir.join("launches.log").display().to_string(),
    );
    cfg.security.pin_scripts_dir = false;
    Arc::new(PythonEngine::new(&cfg).expect("engine"))
}

#[test]
fn each_script_starts_one_worker_for_many_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());
    let langid = language_identifier(&Config::default(), &engine);

    let lines: Vec<String> = (0..10).map(|i| format!("Hello world number {i}")).collect();
    let decisions = langid.batch_detect(&lines);
    assert!(decisions.iter().all(|d| d.language_code == "en"));
    assert_eq!(engine.live_workers(), 2);

    let launches = std::fs::read_to_string(dir.path().join("launches.log")).expect("log");
    assert_eq!(launches.lines().count(), 2);

    drop(langid);
    drop(engine);
}

#[test]
fn missing_script_is_unavailable_without_a_launch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());
    let provider = ScriptProvider::new(&engine, "no_such_model");
    assert!(provider.classify("Hello world").is_err());
    assert_eq!(engine.live_workers(), 0);
    assert!(!dir.path().join("launches.log").exists());
}

#[test]
fn region_crops_are_staged_once_per_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());
    let reader = ScriptProvider::new(&engine, "easyocr");
    let region = RegionImage {
        bbox: BBox::new(0.0, 0.0, 8.0, 4.0),
        image: RgbImage::from_pixel(8, 4, Rgb([200, 10, 10])),
    };

    for _ in 0..3 {
        let lines = reader.read(&region).expect("read");
        assert_eq!(lines[0].text, "hi");
    }
    let other = RegionImage {
        bbox: BBox::new(0.0, 0.0, 4.0, 8.0),
        image: RgbImage::from_pixel(4, 8, Rgb([200, 10, 10])),
    };
    reader.read(&other).expect("read");

    let staged: Vec<String> = std::fs::read_dir(dir.path().join("work").join("regions"))
        .expect("regions dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(staged.len(), 2);
    for name in &staged {
        let stem = name.strip_suffix(".png").expect("png");
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert_eq!(engine.live_workers(), 1);
}
