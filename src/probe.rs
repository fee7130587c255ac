use crate::{config::Config, engine::Page, util::looks_like_url};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProbe {
    pub path: String,
    pub file_bytes: u64,
    pub width: u32,
    pub height: u32,
}

/// Validate an input image against the configured limits without decoding it.
pub fn probe_image(cfg: &Config, input: &Path) -> Result<ImageProbe> {
    let input_str = input.display().to_string();
    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        bail!("URL inputs are disabled: {input_str}");
    }
    if !input.exists() {
        bail!("input does not exist: {input_str}");
    }

    let meta = std::fs::metadata(input).with_context(|| "stat input")?;
    let file_bytes = meta.len();
    if file_bytes == 0 {
        bail!("input is empty: {input_str}");
    }
    if file_bytes > cfg.limits.max_input_file_bytes {
        bail!("input exceeds max_input_file_bytes: {}", file_bytes);
    }

    let (width, height) = image::image_dimensions(input)
        .with_context(|| format!("reading image header: {input_str}"))?;
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 {
        bail!("input has zero pixels: {input_str}");
    }
    if pixels > cfg.limits.max_image_pixels {
        bail!("input exceeds max_image_pixels: {}", pixels);
    }

    Ok(ImageProbe {
        path: input_str,
        file_bytes,
        width,
        height,
    })
}

pub fn load_page(cfg: &Config, input: &Path) -> Result<Page> {
    probe_image(cfg, input)?;
    let image = image::open(input)
        .with_context(|| format!("decoding image: {}", input.display()))?
        .to_rgb8();
    Ok(Page {
        number: 1,
        path: Some(input.to_path_buf()),
        image,
    })
}
