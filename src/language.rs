//! Language codes used by the catalog.
//!
//! The catalog is authored in English. Every other language is served as a
//! translation overlay produced by the translation proxy.

/// Language the catalog is authored in. Translating into it is a no-op.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Languages offered by the language selector.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "fr", "hi", "bn", "te", "ta", "mr"];

/// Check whether a code denotes the default (source) language.
///
/// Comparison ignores ASCII case and surrounding whitespace, and a region
/// suffix (`en-US`, `en_GB`) still counts as the default.
pub fn is_default(code: &str) -> bool {
    let code = code.trim();
    let primary = code.split(['-', '_']).next().unwrap_or(code);
    primary.eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

/// Check whether a code is offered by the language selector.
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(code.trim()))
}

/// Normalize a code from the command line, rejecting ones the selector does
/// not offer. Used as a clap `value_parser`.
pub fn parse_language(code: &str) -> Result<String, String> {
    let code = code.trim().to_ascii_lowercase();
    if is_supported(&code) {
        Ok(code)
    } else {
        Err(format!(
            "unsupported language '{}' (expected one of: {})",
            code,
            SUPPORTED_LANGUAGES.join(", ")
        ))
    }
}

/// Get human-readable language name from ISO code.
///
/// Unknown codes are returned unchanged so the prompt still names a target.
pub fn language_name(code: &str) -> &str {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "hi" => "Hindi",
        "bn" => "Bengali",
        "te" => "Telugu",
        "ta" => "Tamil",
        "mr" => "Marathi",
        "gu" => "Gujarati",
        "kn" => "Kannada",
        "ml" => "Malayalam",
        "pa" => "Punjabi",
        "ur" => "Urdu",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "pl" => "Polish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "tr" => "Turkish",
        "vi" => "Vietnamese",
        "th" => "Thai",
        "id" => "Indonesian",
        _ => code,
    }
}
