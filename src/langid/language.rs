use serde::{Deserialize, Serialize};

pub const UNKNOWN_CODE: &str = "unknown";
pub const UNKNOWN_NAME: &str = "Unknown";

/// The closed set of supported languages. Declaration order is the canonical
/// order used whenever two languages score identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "ur")]
    Urdu,
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "ne")]
    Nepali,
    #[serde(rename = "fa")]
    Persian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    Devanagari,
    Arabic,
}

impl Script {
    pub fn contains(self, c: char) -> bool {
        match self {
            Script::Latin => c.is_ascii_alphabetic(),
            Script::Devanagari => ('\u{0900}'..='\u{097F}').contains(&c),
            Script::Arabic => ('\u{0600}'..='\u{06FF}').contains(&c),
        }
    }
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Hindi,
        Language::Urdu,
        Language::Arabic,
        Language::Nepali,
        Language::Persian,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Urdu => "ur",
            Language::Arabic => "ar",
            Language::Nepali => "ne",
            Language::Persian => "fa",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Urdu => "Urdu",
            Language::Arabic => "Arabic",
            Language::Nepali => "Nepali",
            Language::Persian => "Persian",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(code))
    }

    /// Map a classifier's code (ISO 639-1/-2 or English name) onto the set.
    pub fn from_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Language::English),
            "hi" | "hin" | "hindi" => Some(Language::Hindi),
            "ur" | "urd" | "urdu" => Some(Language::Urdu),
            "ar" | "ara" | "arabic" => Some(Language::Arabic),
            "ne" | "nep" | "nepali" | "nepalese" => Some(Language::Nepali),
            "fa" | "fas" | "per" | "persian" | "farsi" => Some(Language::Persian),
            _ => None,
        }
    }

    pub fn script(self) -> Script {
        match self {
            Language::English => Script::Latin,
            Language::Hindi | Language::Nepali => Script::Devanagari,
            Language::Urdu | Language::Arabic | Language::Persian => Script::Arabic,
        }
    }

    pub fn common_words(self) -> &'static [&'static str] {
        match self {
            Language::English => &["the", "and", "or", "in", "on", "at", "to", "for", "of", "with"],
            Language::Hindi => &["का", "के", "की", "है", "में", "और", "या", "पर", "से", "तक"],
            Language::Urdu => &["اور", "کی", "کے", "ہے", "میں", "پر", "سے", "تک", "یا", "لیے"],
            Language::Arabic => &["في", "من", "إلى", "على", "عن", "مع", "هذا", "هذه", "التي", "الذي"],
            Language::Nepali => &["को", "का", "की", "मा", "र", "पनि", "तर", "अथवा", "यो", "त्यो"],
            Language::Persian => &["در", "از", "به", "با", "که", "این", "آن", "برای", "تا", "یا"],
        }
    }

    /// Expected relative frequency of a handful of characteristic characters.
    pub fn char_profile(self) -> &'static [(char, f32)] {
        match self {
            Language::English => &[('e', 0.12), ('t', 0.09), ('a', 0.08), ('o', 0.08), ('i', 0.07)],
            // aa, e, ii vowel signs, ka, ma
            Language::Hindi => &[
                ('\u{093E}', 0.15),
                ('\u{0947}', 0.12),
                ('\u{0940}', 0.10),
                ('\u{0915}', 0.08),
                ('\u{092E}', 0.07),
            ],
            Language::Nepali => &[
                ('\u{093E}', 0.14),
                ('\u{0947}', 0.11),
                ('\u{0940}', 0.09),
                ('\u{0915}', 0.08),
                ('\u{092E}', 0.07),
            ],
            // alef, farsi yeh, reh, keheh, meem
            Language::Urdu => &[
                ('\u{0627}', 0.12),
                ('\u{06CC}', 0.10),
                ('\u{0631}', 0.08),
                ('\u{06A9}', 0.07),
                ('\u{0645}', 0.06),
            ],
            // alef, lam, yeh, noon, reh
            Language::Arabic => &[
                ('\u{0627}', 0.15),
                ('\u{0644}', 0.12),
                ('\u{064A}', 0.10),
                ('\u{0646}', 0.08),
                ('\u{0631}', 0.07),
            ],
            // alef, farsi yeh, reh, noon, dal
            Language::Persian => &[
                ('\u{0627}', 0.13),
                ('\u{06CC}', 0.11),
                ('\u{0631}', 0.09),
                ('\u{0646}', 0.08),
                ('\u{062F}', 0.07),
            ],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
