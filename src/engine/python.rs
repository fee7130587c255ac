use super::{
    types::{ElementKind, LayoutBox, OcrLine, Page, RegionImage},
    LanguageClassifier, LayoutDetector, OcrReader, TextSimilarity, VisionGenerator,
};
use crate::{config::Config, error::ProviderError, langid::Language};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

/// Subprocess bridge to the Python model scripts.
///
/// Built once per process and shared behind an `Arc` by every script-backed
/// provider. Each script runs as one long-lived worker, started on first use,
/// so model weights load once. Requests and replies are line-delimited JSON:
/// one request object per stdin line, one
/// `{"ok": bool, "result": ..., "error": ...}` object per stdout line.
/// A worker that times out, exits or answers garbage is killed and respawned
/// on the next call.
pub struct PythonEngine {
    cfg: Config,
    scripts_dir: PathBuf,
    work_dir: PathBuf,
    python_exe: PathBuf,
    workers: Mutex<HashMap<PathBuf, Worker>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub python_exe: String,
    pub python_version: Option<String>,
    pub scripts: BTreeMap<String, bool>,
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
struct ScriptReply<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

const KNOWN_SCRIPTS: [&str; 7] = [
    "layout_detect.py",
    "ocr_easyocr.py",
    "ocr_trocr.py",
    "vlm_describe.py",
    "langid_classify.py",
    "langdetect_classify.py",
    "bertscore.py",
];

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        let python_exe = resolve_python_exe(&cfg.engine.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            scripts_dir,
            work_dir: PathBuf::from(&cfg.paths.work_dir),
            python_exe,
            workers: Mutex::new(HashMap::new()),
        })
    }

    fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    pub fn doctor(&self) -> DoctorReport {
        let python_version = Command::new(&self.python_exe)
            .arg("--version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| {
                // Older interpreters print the version on stderr.
                let raw = if o.stdout.is_empty() { o.stderr } else { o.stdout };
                String::from_utf8_lossy(&raw).trim().to_string()
            });
        let scripts: BTreeMap<String, bool> = KNOWN_SCRIPTS
            .iter()
            .map(|s| (s.to_string(), self.script(s).exists()))
            .collect();
        let ok = python_version.is_some() && scripts.values().all(|v| *v);
        DoctorReport {
            python_exe: self.python_exe.display().to_string(),
            python_version,
            scripts,
            ok,
        }
    }

    fn call<I: Serialize, O: for<'de> Deserialize<'de>>(
        &self,
        script_name: &str,
        input: &I,
    ) -> Result<O, ProviderError> {
        let script = self.script(script_name);
        if !script.exists() {
            return Err(ProviderError::Unavailable(format!(
                "missing script: {}",
                script.display()
            )));
        }
        let timeout = match self.cfg.engine.script_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let reply: ScriptReply<O> = self
            .request(&script, input, timeout)
            .map_err(|e| ProviderError::Inference(format!("{e:#}")))?;
        if !reply.ok {
            return Err(ProviderError::Inference(
                reply
                    .error
                    .unwrap_or_else(|| format!("{script_name} returned ok=false")),
            ));
        }
        reply.result.ok_or(ProviderError::Empty)
    }

    /// Send one request to the script's worker, starting it if needed.
    /// Calls are serialized; a failed exchange retires the worker.
    fn request<I: Serialize, O: for<'de> Deserialize<'de>>(
        &self,
        script: &Path,
        input: &I,
        timeout: Option<Duration>,
    ) -> Result<O> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.contains_key(script) {
            let worker = self.spawn_worker(script)?;
            workers.insert(script.to_path_buf(), worker);
        }
        let worker = workers
            .get_mut(script)
            .ok_or_else(|| anyhow!("worker missing: {}", script.display()))?;

        let outcome = worker.exchange(input, timeout).and_then(|line| {
            serde_json::from_str(&line)
                .with_context(|| format!("parsing python JSON reply: {}", script.display()))
        });
        if outcome.is_err() {
            warn!("retiring python worker {}", script.display());
            workers.remove(script);
        }
        outcome
    }

    fn spawn_worker(&self, script: &Path) -> Result<Worker> {
        info!("starting python worker {}", script.display());
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(script);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.engine.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", script.display()))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("no stderr"))?;

        // Both pipes are drained on their own threads so verbose model logging
        // can't deadlock the child on a full buffer.
        let (tx, replies) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let stop = line.is_err();
                if tx.send(line).is_err() || stop {
                    break;
                }
            }
        });

        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let tail = Arc::clone(&stderr_tail);
        let keep = self.cfg.debug.keep_python_stderr;
        let name = script.display().to_string();
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if keep {
                    debug!("python stderr {name}: {line}");
                }
                let mut tail = tail.lock().unwrap_or_else(PoisonError::into_inner);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        });

        Ok(Worker {
            child,
            stdin,
            replies,
            stderr_tail,
        })
    }

    /// Number of script workers currently running.
    pub fn live_workers(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Write region pixels to the work dir as PNG, keyed by content hash.
    fn stage_pixels(&self, image: &image::RgbImage) -> Result<PathBuf, ProviderError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ProviderError::Empty);
        }
        let dir = self.work_dir.join("regions");
        std::fs::create_dir_all(&dir)?;
        let mut hasher = Sha256::new();
        hasher.update(image.as_raw());
        hasher.update(image.width().to_le_bytes());
        let path = dir.join(format!("{:x}.png", hasher.finalize()));
        if !path.exists() {
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| ProviderError::Inference(format!("writing region png: {e}")))?;
        }
        Ok(path)
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("DOCSTAGE_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn script_for(name: &str) -> String {
    match name {
        "layout_detect" => "layout_detect.py".into(),
        "easyocr" => "ocr_easyocr.py".into(),
        "trocr" => "ocr_trocr.py".into(),
        "vlm" => "vlm_describe.py".into(),
        "langid" => "langid_classify.py".into(),
        "langdetect" => "langdetect_classify.py".into(),
        "bertscore" => "bertscore.py".into(),
        other => format!("{other}.py"),
    }
}

fn language_codes() -> Vec<&'static str> {
    Language::ALL.iter().map(|l| l.code()).collect()
}

/// A named provider backed by one script.
#[derive(Clone)]
pub struct ScriptProvider {
    engine: Arc<PythonEngine>,
    label: String,
    script: String,
}

impl ScriptProvider {
    pub fn new(engine: &Arc<PythonEngine>, name: &str) -> Self {
        Self {
            engine: Arc::clone(engine),
            label: name.to_string(),
            script: script_for(name),
        }
    }
}

impl LayoutDetector for ScriptProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn detect(&self, page: &Page) -> Result<Vec<LayoutBox>, ProviderError> {
        let image_path = match &page.path {
            Some(p) => p.clone(),
            None => self.engine.stage_pixels(&page.image)?,
        };
        self.engine.call(
            &self.script,
            &serde_json::json!({
                "cmd": "detect",
                "image_path": image_path,
                "width": page.width(),
                "height": page.height(),
            }),
        )
    }
}

impl OcrReader for ScriptProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn read(&self, region: &RegionImage) -> Result<Vec<OcrLine>, ProviderError> {
        let image_path = self.engine.stage_pixels(&region.image)?;
        self.engine.call(
            &self.script,
            &serde_json::json!({
                "cmd": "read",
                "image_path": image_path,
                "languages": language_codes(),
            }),
        )
    }
}

impl VisionGenerator for ScriptProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn generate(&self, region: &RegionImage, kind: ElementKind) -> Result<String, ProviderError> {
        let image_path = self.engine.stage_pixels(&region.image)?;
        self.engine.call(
            &self.script,
            &serde_json::json!({
                "cmd": "describe",
                "image_path": image_path,
                "element_type": kind,
            }),
        )
    }
}

impl LanguageClassifier for ScriptProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn classify(&self, text: &str) -> Result<Vec<(String, f32)>, ProviderError> {
        self.engine.call(
            &self.script,
            &serde_json::json!({
                "cmd": "classify",
                "text": text,
                "languages": language_codes(),
            }),
        )
    }
}

impl TextSimilarity for ScriptProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn similarity(&self, generated: &str, reference: &str) -> Result<f32, ProviderError> {
        self.engine.call(
            &self.script,
            &serde_json::json!({
                "cmd": "score",
                "candidate": generated,
                "reference": reference,
            }),
        )
    }
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<std::io::Result<String>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl Worker {
    fn exchange<I: Serialize>(&mut self, input: &I, timeout: Option<Duration>) -> Result<String> {
        let mut line = serde_json::to_vec(input)?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .and_then(|()| self.stdin.flush())
            .map_err(|e| anyhow!("writing to python worker: {e}; stderr: {}", self.stderr()))?;

        loop {
            let next = match timeout {
                Some(limit) => match self.replies.recv_timeout(limit) {
                    Ok(next) => next,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(anyhow!(
                            "python worker exceeded timeout ({limit:?}); stderr: {}",
                            self.stderr()
                        ));
                    }
                    Err(RecvTimeoutError::Disconnected) => return Err(self.exited()),
                },
                None => self.replies.recv().map_err(|_| self.exited())?,
            };
            let reply = next.with_context(|| "reading python stdout")?;
            if !reply.trim().is_empty() {
                return Ok(reply);
            }
        }
    }

    fn exited(&self) -> anyhow::Error {
        anyhow!("python worker exited; stderr: {}", self.stderr())
    }

    fn stderr(&self) -> String {
        let tail = self
            .stderr_tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
