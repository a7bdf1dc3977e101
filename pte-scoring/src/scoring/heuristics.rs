//! Closed-form fallback scoring
//!
//! Used whenever the assessment oracle cannot produce a result. Every curve
//! returns a raw 0-90 value; banding happens in the engine, exactly as for
//! oracle output.

use std::collections::{HashMap, HashSet};

use pte_common::models::{RawSubScores, SpeakingSubtype};

use super::bands::clamp_to_90;
use super::metrics::{tokenize, SpeechMetrics};

/// Average words spent describing one image element
const WORDS_PER_ELEMENT: f64 = 8.0;

/// Fluency from speaking pace, minus a filler penalty
///
/// Ideal pace is 100-160 words per minute; every percent of fillers costs
/// one point.
pub fn fluency_score(metrics: &SpeechMetrics) -> f64 {
    let wpm = metrics.words_per_minute;
    let pace = if (100.0..=160.0).contains(&wpm) {
        85.0
    } else if (80.0..=180.0).contains(&wpm) {
        70.0
    } else if wpm >= 60.0 {
        55.0
    } else if wpm > 0.0 {
        40.0
    } else {
        0.0
    };

    clamp_to_90(pace - metrics.filler_rate * 100.0)
}

/// Share of reference tokens reproduced (multiset overlap), on 0-90
pub fn reference_coverage(tokens: &[String], reference: &[String]) -> f64 {
    if reference.is_empty() {
        return 0.0;
    }

    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for word in reference {
        *remaining.entry(word.as_str()).or_default() += 1;
    }

    let mut matched = 0usize;
    for word in tokens {
        if let Some(left) = remaining.get_mut(word.as_str()) {
            if *left > 0 {
                *left -= 1;
                matched += 1;
            }
        }
    }

    clamp_to_90(matched as f64 * 90.0 / reference.len() as f64)
}

/// Share of an expected response length actually spoken, on 0-90
pub fn length_coverage(word_count: usize, target_words: f64) -> f64 {
    if target_words <= 0.0 {
        return 0.0;
    }
    clamp_to_90((word_count as f64 / target_words).min(1.0) * 90.0)
}

/// Describe-image content: word density stands in for described elements
pub fn describe_image_content(metrics: &SpeechMetrics) -> f64 {
    let elements = metrics.word_count as f64 / WORDS_PER_ELEMENT;
    if elements >= 7.0 {
        85.0
    } else if elements >= 5.0 {
        70.0
    } else if elements >= 3.0 {
        55.0
    } else if elements >= 1.0 {
        40.0
    } else if metrics.word_count > 0 {
        20.0
    } else {
        0.0
    }
}

/// Open responses: length against a target plus lexical variety
fn open_response_content(tokens: &[String], target_words: f64) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let variety = unique.len() as f64 / tokens.len() as f64;
    let coverage = (tokens.len() as f64 / target_words).min(1.0);

    clamp_to_90(coverage * 75.0 + variety * 15.0)
}

/// Short answers: full credit when every expected-answer token is spoken
fn short_answer_content(tokens: &[String], reference: Option<&[String]>) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    match reference {
        Some(expected) if !expected.is_empty() => {
            if expected.iter().all(|word| tokens.contains(word)) {
                90.0
            } else {
                20.0
            }
        }
        // Unverifiable without an expected answer; concise replies score higher
        _ => {
            if tokens.len() <= 6 {
                60.0
            } else {
                40.0
            }
        }
    }
}

/// Expected response length when no reference text is available
fn target_words(subtype: SpeakingSubtype) -> f64 {
    match subtype {
        SpeakingSubtype::ReadAloud => 60.0,
        SpeakingSubtype::RepeatSentence => 15.0,
        SpeakingSubtype::DescribeImage => 60.0,
        SpeakingSubtype::RetellLecture => 70.0,
        SpeakingSubtype::AnswerShortQuestion => 3.0,
        SpeakingSubtype::SummarizeGroupDiscussion => 90.0,
        SpeakingSubtype::RespondToASituation => 50.0,
    }
}

/// Content score for a subtype
pub fn content_score(
    subtype: SpeakingSubtype,
    tokens: &[String],
    metrics: &SpeechMetrics,
    reference_text: Option<&str>,
) -> f64 {
    let reference = reference_text
        .map(tokenize)
        .filter(|reference| !reference.is_empty());

    match subtype {
        SpeakingSubtype::ReadAloud | SpeakingSubtype::RepeatSentence => match &reference {
            Some(reference) => reference_coverage(tokens, reference),
            None => length_coverage(metrics.word_count, target_words(subtype)),
        },
        SpeakingSubtype::DescribeImage => describe_image_content(metrics),
        SpeakingSubtype::AnswerShortQuestion => short_answer_content(tokens, reference.as_deref()),
        SpeakingSubtype::RetellLecture
        | SpeakingSubtype::SummarizeGroupDiscussion
        | SpeakingSubtype::RespondToASituation => open_response_content(tokens, target_words(subtype)),
    }
}

/// All three raw sub-scores for an attempt
pub fn score(
    subtype: SpeakingSubtype,
    tokens: &[String],
    metrics: &SpeechMetrics,
    reference_text: Option<&str>,
) -> RawSubScores {
    let content = content_score(subtype, tokens, metrics, reference_text).round();
    let fluency = fluency_score(metrics).round();
    let pronunciation = clamp_to_90(((content + fluency) / 2.0).round());

    RawSubScores {
        content,
        pronunciation,
        fluency,
    }
}
