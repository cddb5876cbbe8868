//! Language utilities for ISO language code handling
//!
//! Job messages carry ISO 639-1 codes, but intake front-ends occasionally
//! send 639-2 codes. Everything is normalized to lowercase 639-1 before it
//! reaches the router; model catalog keys use 639-1 pairs.

use anyhow::{Result, anyhow};
use isolang::Language;
use serde::Serialize;

/// Languages served to clients, as (code, English name)
pub const SUPPORTED_LANGUAGES: [(&str, &str); 9] = [
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("th", "Thai"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// Pivot language for two-hop translation
pub const PIVOT_LANGUAGE: &str = "en";

/// Entry of the supported languages list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedLanguage {
    pub name: String,
    pub code: String,
}

/// Supported languages in the shape clients expect
pub fn supported_languages() -> Vec<SupportedLanguage> {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| SupportedLanguage {
            name: name.to_string(),
            code: code.to_string(),
        })
        .collect()
}

/// ISO 639-2/B codes that differ from their 639-2/T form
fn part2b_to_part2t(code: &str) -> &str {
    match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "per" => "fas",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        other => other,
    }
}

/// Normalize a language code to ISO 639-1 (2-letter) format
pub fn normalize_to_part1(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    let language = match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => Language::from_639_3(part2b_to_part2t(&normalized_code)),
        _ => None,
    };

    language
        .and_then(|lang| lang.to_639_1())
        .map(|part1| part1.to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part1(code)?;
    let lang = Language::from_639_1(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Catalog key for a language pair
pub fn pair_key(source: &str, target: &str) -> String {
    format!("{}-{}", source, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizeToPart1_withThreeLetterCodes_shouldConvert() {
        assert_eq!(normalize_to_part1("fra").unwrap(), "fr");
        assert_eq!(normalize_to_part1("ger").unwrap(), "de");
        assert_eq!(normalize_to_part1(" VI ").unwrap(), "vi");
    }

    #[test]
    fn test_normalizeToPart1_withUnknownCode_shouldFail() {
        assert!(normalize_to_part1("xx").is_err());
        assert!(normalize_to_part1("english").is_err());
    }

    #[test]
    fn test_supportedLanguages_shouldListNineEntriesInOrder() {
        let langs = supported_languages();
        assert_eq!(langs.len(), 9);
        assert_eq!(langs[0], SupportedLanguage { name: "German".into(), code: "de".into() });
        assert_eq!(langs[8].code, "zh");
        for lang in &langs {
            assert!(get_language_name(&lang.code).is_ok());
        }
    }
}
