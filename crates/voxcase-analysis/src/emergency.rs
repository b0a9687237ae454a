//! **Emergency detection** — keyword scan over transcript text.
//!
//! A fixed bilingual keyword list matched case-insensitively against the
//! transcript. Independent of the emotion classifier; both feed the same
//! emergency flag on the recording via logical OR.

/// Keywords that flag a transcript as describing an in-progress emergency.
/// Spanish first (primary user base), then English equivalents.
pub const EMERGENCY_KEYWORDS: &[&str] = &[
    "ayuda",
    "auxilio",
    "socorro",
    "emergencia",
    "me están deteniendo",
    "me detienen",
    "policía",
    "migración",
    "la migra",
    "peligro",
    "help",
    "emergency",
    "they are detaining me",
    "detained",
    "arrest",
    "police",
    "danger",
];

/// Scan a transcript for emergency keywords. Returns every matched keyword in
/// list order, without duplicates. Matching is case-insensitive substring
/// containment (transcripts are free text, not tokenized).
pub fn scan_transcript(text: &str) -> Vec<String> {
    let haystack = text.to_lowercase();
    EMERGENCY_KEYWORDS
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .map(|kw| kw.to_string())
        .collect()
}
