//! Human-readable display names for language tags.
//!
//! Covers the ISO 639-1 codes we see in practice. Unknown tags (including the
//! synthetic `audio<index>` placeholders the prober assigns to untagged
//! streams) fall through to the tag itself so every track still renders a
//! usable `NAME=` attribute.

/// Resolve a language tag to a display name for the master playlist.
pub fn language_display_name(tag: &str) -> &str {
    match tag {
        "ar" | "ara" => "Arabic",
        "bn" | "ben" => "Bengali",
        "cs" | "ces" => "Czech",
        "da" | "dan" => "Danish",
        "de" | "deu" | "ger" => "German",
        "el" | "ell" => "Greek",
        "en" | "eng" => "English",
        "es" | "spa" => "Spanish",
        "fa" | "fas" => "Persian",
        "fi" | "fin" => "Finnish",
        "fr" | "fra" | "fre" => "French",
        "he" | "heb" => "Hebrew",
        "hi" | "hin" => "Hindi",
        "hu" | "hun" => "Hungarian",
        "id" | "ind" => "Indonesian",
        "it" | "ita" => "Italian",
        "ja" | "jpn" => "Japanese",
        "ko" | "kor" => "Korean",
        "nl" | "nld" | "dut" => "Dutch",
        "no" | "nor" => "Norwegian",
        "pl" | "pol" => "Polish",
        "pt" | "por" => "Portuguese",
        "ro" | "ron" | "rum" => "Romanian",
        "ru" | "rus" => "Russian",
        "sv" | "swe" => "Swedish",
        "th" | "tha" => "Thai",
        "tr" | "tur" => "Turkish",
        "uk" | "ukr" => "Ukrainian",
        "vi" | "vie" => "Vietnamese",
        "zh" | "zho" | "chi" => "Chinese",
        other => other,
    }
}
