//! Transcript tokenization and delivery metrics

/// Single-token fillers
const FILLER_WORDS: &[&str] = &["um", "umm", "uh", "uhh", "er", "erm", "ah", "hmm", "mm"];

/// Two-token filler phrases
const FILLER_PHRASES: &[(&str, &str)] = &[("you", "know"), ("sort", "of"), ("kind", "of")];

/// Delivery metrics derived from a transcript and its duration
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechMetrics {
    pub word_count: usize,
    pub filler_count: usize,
    pub words_per_minute: f64,
    /// Fillers per word (0.0-1.0)
    pub filler_rate: f64,
    pub duration_ms: u64,
}

/// Lowercase, replace non-letter runs with a single break, drop empties
///
/// ```
/// use pte_scoring::scoring::metrics::tokenize;
///
/// assert_eq!(tokenize("  The quick-brown FOX!! "), vec!["the", "quick", "brown", "fox"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count filler words and phrases
///
/// Phrase matches consume both tokens, so "you know" counts once.
pub fn count_fillers(tokens: &[String]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < tokens.len() {
        let is_phrase = tokens.get(i + 1).is_some_and(|next| {
            FILLER_PHRASES
                .iter()
                .any(|(first, second)| tokens[i] == *first && next == second)
        });

        if is_phrase {
            count += 1;
            i += 2;
            continue;
        }

        if FILLER_WORDS.contains(&tokens[i].as_str()) {
            count += 1;
        }
        i += 1;
    }
    count
}

impl SpeechMetrics {
    /// Compute metrics for a transcript spoken over `duration_ms`
    pub fn from_transcript(transcript: &str, duration_ms: u64) -> Self {
        let tokens = tokenize(transcript);
        Self::from_tokens(&tokens, duration_ms)
    }

    pub fn from_tokens(tokens: &[String], duration_ms: u64) -> Self {
        let word_count = tokens.len();
        let filler_count = count_fillers(tokens);

        let minutes = duration_ms as f64 / 60_000.0;
        let words_per_minute = if minutes > 0.0 { word_count as f64 / minutes } else { 0.0 };
        let filler_rate = if word_count > 0 {
            filler_count as f64 / word_count as f64
        } else {
            0.0
        };

        Self {
            word_count,
            filler_count,
            words_per_minute,
            filler_rate,
            duration_ms,
        }
    }
}
