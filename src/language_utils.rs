//! Language utilities for ISO language code handling
//!
//! Configuration, the CLI and the language detector all speak ISO 639-1 where
//! one exists; 3-letter codes (639-2/T and 639-2/B) are accepted and mapped.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Source language value that asks for automatic detection
pub const AUTO_DETECT: &str = "auto";

/// Map an ISO 639-2/B bibliographic code to its 639-2/T form
fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        _ => return None,
    };
    Some(mapped)
}

/// Resolve any supported code form to an isolang language
fn resolve(code: &str) -> Option<Language> {
    let code = code.trim().to_lowercase();
    match code.len() {
        2 => Language::from_639_1(&code),
        3 => Language::from_639_3(&code)
            .or_else(|| bibliographic_to_terminology(&code).and_then(Language::from_639_3)),
        _ => None,
    }
}

/// Check that a code is a valid ISO 639-1 or 639-2 language code
pub fn validate_language_code(code: &str) -> Result<()> {
    resolve(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Check a source language code, which may also be [`AUTO_DETECT`]
pub fn validate_source_language(code: &str) -> Result<()> {
    if is_auto_detect(code) {
        return Ok(());
    }
    validate_language_code(code)
}

/// Whether the code asks for automatic source detection
pub fn is_auto_detect(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_DETECT)
}

/// Convert an ISO 639-3 code (as produced by detectors) to the 2-letter form
pub fn from_639_3(code: &str) -> Option<String> {
    Language::from_639_3(code).map(|lang| {
        lang.to_639_1()
            .map(str::to_string)
            .unwrap_or_else(|| lang.to_639_3().to_string())
    })
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (resolve(code1), resolve(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => code1.trim().eq_ignore_ascii_case(code2.trim()),
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = resolve(code).ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(lang.to_name().to_string())
}
