use crate::config::Ocr;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// Word characters, whitespace, and the Arabic/Devanagari blocks including
// presentation forms. Everything else is recognizer noise.
static RE_ARTIFACTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[^\w\s\x{0600}-\x{06FF}\x{0750}-\x{077F}\x{08A0}-\x{08FF}\x{0900}-\x{097F}\x{FB50}-\x{FDFF}\x{FE70}-\x{FEFF}]",
    )
    .expect("valid artifact regex")
});

/// Clean one recognized line. Returns `None` when nothing usable is left.
pub fn clean_line(cfg: &Ocr, raw: &str) -> Option<String> {
    let mut s = sanitize_control_chars(raw);

    if cfg.normalize_unicode {
        s = s.nfkc().collect::<String>();
    }

    if cfg.strip_artifacts {
        s = RE_ARTIFACTS.replace_all(&s, "").into_owned();
    }

    s = collapse_whitespace(&s);

    if s.chars().count() < cfg.min_line_chars.max(1) {
        return None;
    }
    Some(s)
}

pub fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Drop C0/C1 controls. Tabs and newlines become plain spaces so they still
/// separate words after collapsing.
pub fn sanitize_control_chars(s: &str) -> String {
    s.chars()
        .filter_map(|ch| match ch {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
