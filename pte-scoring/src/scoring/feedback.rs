//! Rubric text and candidate-facing feedback

use pte_common::models::{Feedback, SpeakingSubtype};

/// Feedback summary for empty or too-short recordings
pub const NO_SPEECH_SUMMARY: &str =
    "No speech detected. Please ensure your microphone is working and try again.";

/// Pace below this earns a "speak faster" hint
const SLOW_PACE_WPM: f64 = 80.0;
/// Pace above this earns a "slow down" hint
const FAST_PACE_WPM: f64 = 180.0;

/// Scoring criteria shown next to a result
pub fn rubric_for(subtype: SpeakingSubtype) -> &'static str {
    match subtype {
        SpeakingSubtype::ReadAloud => {
            "Content: Word accuracy and completeness. Pronunciation: Clarity and stress. Fluency: Smooth delivery."
        }
        SpeakingSubtype::RepeatSentence => {
            "Content: Sentence accuracy. Pronunciation: Native-like sounds. Fluency: Natural rhythm."
        }
        SpeakingSubtype::DescribeImage => {
            "Content: Key features covered. Organization: Logical flow. Fluency: Smooth delivery."
        }
        SpeakingSubtype::RetellLecture => {
            "Content: Main points captured. Coherence: Logical structure. Fluency: Natural speech."
        }
        SpeakingSubtype::AnswerShortQuestion => "Content: Correct answer. Pronunciation: Clear delivery.",
        SpeakingSubtype::SummarizeGroupDiscussion => {
            "Content: Key points summarized. Organization: Logical flow. Fluency: Smooth delivery."
        }
        SpeakingSubtype::RespondToASituation => {
            "Content: Appropriate response. Pronunciation: Clear delivery. Fluency: Natural speech."
        }
    }
}

/// One-paragraph summary for a total score, with a pace hint when relevant
pub fn summary(total: u8, words_per_minute: f64) -> String {
    let mut text = if total >= 80 {
        "Excellent performance! Your response demonstrated strong command of spoken English.".to_string()
    } else if total >= 60 {
        "Good attempt. Continue practicing to improve fluency and pronunciation.".to_string()
    } else if total >= 40 {
        "Fair performance. Focus on speaking clearly and maintaining a steady pace.".to_string()
    } else {
        "More practice needed. Work on reading aloud daily to build confidence.".to_string()
    };

    if let Some(hint) = pace_hint(words_per_minute) {
        text.push(' ');
        text.push_str(hint);
    }
    text
}

fn pace_hint(words_per_minute: f64) -> Option<&'static str> {
    if words_per_minute < SLOW_PACE_WPM {
        Some("Your speaking pace was slow; aim for 120-150 words per minute.")
    } else if words_per_minute > FAST_PACE_WPM {
        Some("Try to slow down slightly for clearer pronunciation.")
    } else {
        None
    }
}

/// Feedback for a heuristically scored attempt
pub fn heuristic_feedback(total: u8, words_per_minute: f64, filler_rate: f64) -> Feedback {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if (SLOW_PACE_WPM..=FAST_PACE_WPM).contains(&words_per_minute) {
        strengths.push("Speaking pace is within the expected range".to_string());
    } else {
        improvements.push("Keep a steady pace of 120-150 words per minute".to_string());
    }

    if filler_rate == 0.0 {
        strengths.push("No filler words".to_string());
    } else if filler_rate > 0.05 {
        improvements.push("Reduce filler words such as \"um\" and \"you know\"".to_string());
    }

    Feedback {
        summary: summary(total, words_per_minute),
        strengths,
        improvements,
        detailed_analysis: None,
    }
}

/// Feedback for an empty or too-short recording
pub fn no_speech_feedback() -> Feedback {
    Feedback {
        summary: NO_SPEECH_SUMMARY.to_string(),
        strengths: Vec::new(),
        improvements: vec!["Record a complete spoken response".to_string()],
        detailed_analysis: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_bands() {
        assert!(summary(85, 130.0).starts_with("Excellent"));
        assert!(summary(60, 130.0).starts_with("Good"));
        assert!(summary(40, 130.0).starts_with("Fair"));
        assert!(summary(39, 130.0).starts_with("More practice"));
    }

    #[test]
    fn test_pace_hints() {
        assert!(summary(54, 75.0).ends_with("aim for 120-150 words per minute."));
        assert!(summary(54, 200.0).ends_with("clearer pronunciation."));
        assert!(!summary(54, 130.0).contains("pace"));
    }

    #[test]
    fn test_every_subtype_has_a_rubric() {
        for subtype in SpeakingSubtype::ALL {
            assert!(rubric_for(subtype).starts_with("Content:"));
        }
    }

    #[test]
    fn test_heuristic_feedback_flags_fillers() {
        let feedback = heuristic_feedback(30, 130.0, 0.2);
        assert!(feedback.improvements.iter().any(|i| i.contains("filler")));
        assert!(feedback.strengths.iter().any(|s| s.contains("pace")));
    }
}
