use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub langid: LangId,
    #[serde(default)]
    pub fallback: Fallback,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub describe: Describe,
    #[serde(default)]
    pub evaluation: Evaluation,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub print_summary: bool,
    pub resume: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            resume: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".docstage-work".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_image_pixels: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 200 * 1024 * 1024,
            max_image_pixels: 100_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub python_exe: String,
    pub script_timeout_seconds: u64,
    pub env: std::collections::BTreeMap<String, String>,
    pub layout_providers: Vec<String>,
    pub ocr_providers: Vec<String>,
    pub describe_providers: Vec<String>,
    pub similarity_provider: String,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            python_exe: "auto".into(),
            script_timeout_seconds: 120,
            env: Default::default(),
            layout_providers: vec!["layout_detect".into()],
            ocr_providers: vec!["easyocr".into(), "trocr".into()],
            describe_providers: vec!["vlm".into()],
            similarity_provider: "bertscore".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub min_score: f32,
    pub template_class: String,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            min_score: 0.25,
            template_class: "Text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LangId {
    pub strategies: Vec<String>,
    pub statistical_threshold: f32,
    pub trigram_threshold: f32,
    pub pattern_threshold: f32,
    pub feature_threshold: f32,
    pub decision_threshold: f32,
    pub alias_threshold: f32,
    pub alias_confidence_factor: f32,
    pub feature_word_weight: f32,
    pub feature_char_weight: f32,
    pub min_alternative_score: f32,
    pub max_alternatives: usize,
}
impl Default for LangId {
    fn default() -> Self {
        Self {
            strategies: vec![
                "statistical".into(),
                "trigram".into(),
                "pattern".into(),
                "feature".into(),
            ],
            statistical_threshold: 0.7,
            trigram_threshold: 0.6,
            pattern_threshold: 0.3,
            feature_threshold: 0.4,
            decision_threshold: 0.6,
            alias_threshold: 0.8,
            alias_confidence_factor: 0.8,
            feature_word_weight: 0.6,
            feature_char_weight: 0.4,
            min_alternative_score: 0.1,
            max_alternatives: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Fallback {
    pub template_confidence: f32,
}
impl Default for Fallback {
    fn default() -> Self {
        Self {
            template_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    /// Grayscale, equalize, binarize and denoise crops before reading.
    pub preprocess: bool,
    pub normalize_unicode: bool,
    pub strip_artifacts: bool,
    pub min_line_chars: usize,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            preprocess: true,
            normalize_unicode: true,
            strip_artifacts: true,
            min_line_chars: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Describe {
    pub generator_confidence: f32,
    pub enhance: bool,
}
impl Default for Describe {
    fn default() -> Self {
        Self {
            generator_confidence: 0.8,
            enhance: true,
        }
    }
}

/// `[primary, secondary]` weights per element type. Each pair should sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Evaluation {
    pub chart_weights: [f32; 2],
    pub map_weights: [f32; 2],
    pub table_weights: [f32; 2],
    pub figure_weights: [f32; 2],
}
impl Default for Evaluation {
    fn default() -> Self {
        Self {
            chart_weights: [0.5, 0.5],
            map_weights: [0.5, 0.5],
            table_weights: [0.3, 0.7],
            figure_weights: [0.3, 0.7],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_json: bool,
    pub pretty: bool,
    pub filename_pattern: String,
    pub write_index_json: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_json: true,
            pretty: true,
            filename_pattern: "stage{stage}.json".into(),
            write_index_json: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: false,
        }
    }
}
