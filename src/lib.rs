//! Staged multilingual document understanding.
//!
//! Stage 1 finds layout regions, stage 2 reads text lines and labels their
//! language, stage 3 describes tables, figures, charts and maps. Every model
//! sits behind a capability trait in [`engine`] and is consumed through a
//! [`fallback::FallbackChain`], so a missing or failing model degrades the
//! result instead of aborting it.

pub mod cli;
pub mod config;
pub mod describe;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod fallback;
pub mod langid;
pub mod ocr;
pub mod pipeline;
pub mod policy;
pub mod postprocess;
pub mod probe;
pub mod report;
pub mod textsim;
pub mod util;
