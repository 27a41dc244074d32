/*!
 * Target-language validation of provider output.
 *
 * A provider sometimes answers in the source language or in a third one.
 * The validator runs a language detector over the output and rejects it
 * when a confidently detected language differs from the requested target.
 */

use log::debug;

use crate::errors::ValidationError;
use crate::language_utils;

/// Minimum length (in code points) for detection to be attempted
pub const MIN_VALIDATION_LENGTH: usize = 20;

/// Detects the language of a text
pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code (639-3 when no 2-letter code exists), or `None`
    /// when the language cannot be determined reliably
    fn detect_iso(&self, text: &str) -> Option<String>;
}

/// Trigram detector backed by whatlang
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect_iso(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        if !info.is_reliable() {
            debug!(
                "Unreliable language detection ({} at {:.2})",
                info.lang().code(),
                info.confidence()
            );
            return None;
        }
        language_utils::from_639_3(info.lang().code())
    }
}

/// Checks that a translation is written in the expected language
pub trait LanguageValidator: Send + Sync {
    /// `Ok(())` when the text passes or cannot be judged
    fn is_valid(&self, translated_text: &str, target_lang: &str) -> Result<(), ValidationError>;
}

/// Default validator over any [`LanguageDetector`]
#[derive(Debug, Clone, Default)]
pub struct Validator<D: LanguageDetector = WhatlangDetector> {
    detector: D,
}

impl<D: LanguageDetector> Validator<D> {
    /// Create a validator around a detector
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: LanguageDetector> LanguageValidator for Validator<D> {
    fn is_valid(&self, translated_text: &str, target_lang: &str) -> Result<(), ValidationError> {
        if target_lang.is_empty() {
            return Ok(());
        }

        let text = translated_text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyTranslation);
        }

        if text.chars().count() < MIN_VALIDATION_LENGTH {
            return Ok(());
        }

        let Some(detected) = self.detector.detect_iso(text) else {
            return Ok(());
        };

        if detected.eq_ignore_ascii_case(target_lang)
            || language_utils::language_codes_match(&detected, target_lang)
        {
            Ok(())
        } else {
            Err(ValidationError::LanguageMismatch {
                expected: target_lang.to_string(),
                detected,
            })
        }
    }
}
