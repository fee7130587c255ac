use crate::{
    config::Config,
    engine::{
        python::{PythonEngine, ScriptProvider},
        TextSimilarity,
    },
    evaluate::Evaluator,
    langid::{calculate_metrics, LanguageDecision, StrategyKind},
    pipeline::{language_identifier, Pipeline},
    probe,
    util::{ensure_dir, hash_file, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "docstage")]
#[command(about = "Staged multilingual document understanding (layout, text + language, region descriptions)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./docstage.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the Python interpreter and model scripts.
    Doctor {},
    /// Identify the language of a text, or of each line of a file.
    Detect {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Comma-separated subset of statistical,trigram,pattern,feature.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
        /// Report one strategy's own verdict instead of the ensemble.
        #[arg(long, conflicts_with = "strategies")]
        single: Option<String>,
    },
    /// Run stages 1..=N on one page image.
    Process {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
        stage: i64,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Accuracy and macro P/R/F1 from two files of language codes, one per line.
    Metrics {
        #[arg(long)]
        predictions: PathBuf,
        #[arg(long)]
        ground_truth: PathBuf,
    },
    /// Score one generated description against a reference.
    Evaluate {
        #[arg(long)]
        generated: String,
        #[arg(long)]
        reference: String,
        #[arg(long)]
        element_type: String,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    match &args.cmd {
        Command::Doctor {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            doctor(&cfg)
        }
        Command::Detect {
            text,
            file,
            strategies,
            single,
        } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            detect(
                &cfg,
                text.as_deref(),
                file.as_deref(),
                strategies,
                single.as_deref(),
            )
        }
        Command::Process {
            input,
            stage,
            out_dir,
        } => process(&args, &cfg, input, *stage, out_dir.as_deref()),
        Command::Metrics {
            predictions,
            ground_truth,
        } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            metrics(predictions, ground_truth)
        }
        Command::Evaluate {
            generated,
            reference,
            element_type,
        } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            evaluate(&cfg, generated, reference, element_type)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("docstage.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("docstage.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Command output goes to stdout, so logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PythonEngine::new(cfg)?;
    let diag = engine.doctor();
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        warn!("some model scripts are unavailable; affected chains will fall back to templates");
    }
    Ok(())
}

fn detect(
    cfg: &Config,
    text: Option<&str>,
    file: Option<&Path>,
    strategies: &[String],
    single: Option<&str>,
) -> Result<()> {
    let texts: Vec<String> = match (text, file) {
        (Some(t), None) => vec![t.to_string()],
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        (Some(_), Some(_)) => bail!("pass either TEXT or --file, not both"),
        (None, None) => bail!("nothing to detect: pass TEXT or --file"),
    };

    let kinds = strategies
        .iter()
        .map(|s| StrategyKind::parse(s).ok_or_else(|| anyhow!("unknown strategy: {s}")))
        .collect::<Result<Vec<_>>>()?;
    let single = single
        .map(|s| StrategyKind::parse(s).ok_or_else(|| anyhow!("unknown strategy: {s}")))
        .transpose()?;

    let engine = Arc::new(PythonEngine::new(cfg)?);
    let langid = language_identifier(cfg, &engine);

    let decisions: Vec<LanguageDecision> = texts
        .iter()
        .map(|t| match (single, kinds.is_empty()) {
            (Some(kind), _) => langid.detect_single(t, kind),
            (None, true) => langid.detect(t),
            (None, false) => langid.detect_with(t, &kinds),
        })
        .collect();

    let out = if decisions.len() == 1 {
        serde_json::to_value(&decisions[0])?
    } else {
        serde_json::to_value(&decisions)?
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn process(
    args: &Args,
    cfg: &Config,
    input: &Path,
    stage: i64,
    out_override: Option<&Path>,
) -> Result<()> {
    let cfg_norm = cfg.normalized_for_hash();
    let cfg_hash = sha256_hex(cfg_norm.as_bytes());
    // An unreadable input still gets a job dir so its error can be written out.
    let input_hash = hash_file(input)
        .unwrap_or_else(|_| sha256_hex(input.display().to_string().as_bytes()));
    let job_id = sha256_hex(format!("{}:{}", cfg_hash, input_hash).as_bytes());

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let job_dir = out_root.join(&job_id);

    if job_dir.exists() && !cfg.global.resume {
        return Err(anyhow!(
            "job_dir already exists and resume=false: {}",
            job_dir.display()
        ));
    }

    ensure_dir(&job_dir)?;
    ensure_dir(&job_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&job_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("job_id={job_id} out={}", job_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(job_dir.join("effective-config.toml"), raw)?;
    }

    ensure_dir(Path::new(&cfg.paths.work_dir))?;

    let engine = Arc::new(PythonEngine::new(cfg)?);
    let pipeline = Pipeline::from_engine(cfg, &engine);

    let started = now_rfc3339();
    let output = pipeline.process_path(input, stage);

    let filename = cfg
        .output
        .filename_pattern
        .replace("{stage}", &output.stage.to_string());
    if cfg.output.write_json {
        let body = if cfg.output.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        std::fs::write(job_dir.join(&filename), body)
            .with_context(|| format!("writing {filename}"))?;
    }

    if cfg.output.write_index_json {
        let index = serde_json::json!({
            "job_id": job_id,
            "started": started,
            "finished": now_rfc3339(),
            "input": probe::probe_image(cfg, input).ok(),
            "requested_stage": stage,
            "stage": output.stage,
            "result": filename,
            "ok": output.is_ok(),
            "warnings": output.warnings,
        });
        std::fs::write(job_dir.join("index.json"), serde_json::to_string_pretty(&index)?)?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": job_id,
                "job_dir": job_dir,
                "stage": output.stage,
                "status": if output.is_ok() { "ok" } else { "error" },
                "error": output.error,
            }))?
        );
    }

    match output.error {
        Some(err) => Err(anyhow!("processing failed: {err}")),
        None => Ok(()),
    }
}

fn metrics(predictions: &Path, ground_truth: &Path) -> Result<()> {
    let read_codes = |p: &Path| -> Result<Vec<String>> {
        Ok(std::fs::read_to_string(p)
            .with_context(|| format!("reading {}", p.display()))?
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    };
    let preds = read_codes(predictions)?;
    let truth = read_codes(ground_truth)?;
    let m = calculate_metrics(&preds, &truth)?;
    println!("{}", serde_json::to_string_pretty(&m)?);
    Ok(())
}

fn evaluate(cfg: &Config, generated: &str, reference: &str, element_type: &str) -> Result<()> {
    let mut evaluator = Evaluator::new(&cfg.evaluation);
    let provider = cfg.engine.similarity_provider.trim();
    if !provider.is_empty() {
        let engine = Arc::new(PythonEngine::new(cfg)?);
        let scorer: Box<dyn TextSimilarity> = Box::new(ScriptProvider::new(&engine, provider));
        evaluator.set_secondary(Some(scorer));
    }
    let m = evaluator.evaluate_raw(generated, reference, element_type);
    println!("{}", serde_json::to_string_pretty(&m)?);
    Ok(())
}

fn resolve_log_path(cfg: &Config, job_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(job_dir) = job_dir {
        return Some(job_dir.join("logs").join("docstage.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("docstage.log"))
}
