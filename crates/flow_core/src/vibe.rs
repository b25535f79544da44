//! crates/flow_core/src/vibe.rs
//!
//! Score normalization and the fallback-reason tables. Bucket boundaries are
//! shared by every call site; only the wording differs between analyzing the
//! whole document and analyzing a selection.

/// Two consecutive scores closer than this are treated as the same vibe.
pub const SCORE_EPSILON: f64 = 0.01;

/// Scores above this count as flow state.
pub const FLOW_THRESHOLD: f64 = 0.2;

/// Analysis input is truncated to this many characters before transmission.
pub const ANALYZE_MAX_CHARS: usize = 2000;

/// Placeholder reasons the scoring model is known to emit instead of a real
/// explanation; they are replaced from the bucket tables below.
pub const REASON_SENTINELS: &[&str] = &[
    "Generated fallback response from non-JSON output",
    "DriftingNeutralFlowing",
];

/// Clamps a raw model score into the valid [-1, 1] range.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(-1.0, 1.0)
}

pub fn is_flow(score: f64) -> bool {
    score > FLOW_THRESHOLD
}

/// True when the model's reason should be replaced with a bucket fallback.
pub fn needs_fallback_reason(reason: &str) -> bool {
    reason.is_empty() || REASON_SENTINELS.contains(&reason)
}

/// The fixed score buckets behind every fallback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBucket {
    Strong,
    Engaging,
    Neutral,
    Flat,
    NeedsWork,
}

impl ScoreBucket {
    pub fn for_score(score: f64) -> Self {
        if score >= 0.5 {
            ScoreBucket::Strong
        } else if score >= 0.2 {
            ScoreBucket::Engaging
        } else if score >= -0.2 {
            ScoreBucket::Neutral
        } else if score >= -0.5 {
            ScoreBucket::Flat
        } else {
            ScoreBucket::NeedsWork
        }
    }
}

/// Fallback wording for whole-document analysis.
pub fn document_fallback_reason(score: f64) -> &'static str {
    match ScoreBucket::for_score(score) {
        ScoreBucket::Strong => {
            "Your writing has a strong, inspiring energy that deeply engages readers."
        }
        ScoreBucket::Engaging => {
            "Your narrative flows well and maintains reader interest throughout."
        }
        ScoreBucket::Neutral => {
            "Your writing maintains a steady, neutral tone that could benefit from more emotional resonance."
        }
        ScoreBucket::Flat => {
            "The narrative feels somewhat flat and could use more dynamic elements to engage readers."
        }
        ScoreBucket::NeedsWork => {
            "Your writing lacks emotional connection and could benefit from more vivid language and personal touches."
        }
    }
}

/// Fallback wording for selection analysis.
pub fn selection_fallback_reason(score: f64) -> &'static str {
    match ScoreBucket::for_score(score) {
        ScoreBucket::Strong => "This passage has exceptional energy and emotional resonance.",
        ScoreBucket::Engaging => "This selection engages well with vivid language and good pacing.",
        ScoreBucket::Neutral => "This passage is neutral but could use more dynamic elements.",
        ScoreBucket::Flat => "This selection feels flat and needs more life and energy.",
        ScoreBucket::NeedsWork => "This passage lacks engagement and emotional connection.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_scores_in_range() {
        assert_eq!(clamp_score(3.7), 1.0);
        assert_eq!(clamp_score(-2.0), -1.0);
        assert_eq!(clamp_score(0.42), 0.42);
        assert!((-1.0..=1.0).contains(&clamp_score(f64::MAX)));
    }

    #[test]
    fn bucket_boundaries_are_inclusive_on_the_low_side() {
        assert_eq!(ScoreBucket::for_score(0.5), ScoreBucket::Strong);
        assert_eq!(ScoreBucket::for_score(0.49), ScoreBucket::Engaging);
        assert_eq!(ScoreBucket::for_score(0.2), ScoreBucket::Engaging);
        assert_eq!(ScoreBucket::for_score(-0.2), ScoreBucket::Neutral);
        assert_eq!(ScoreBucket::for_score(-0.21), ScoreBucket::Flat);
        assert_eq!(ScoreBucket::for_score(-0.5), ScoreBucket::Flat);
        assert_eq!(ScoreBucket::for_score(-0.51), ScoreBucket::NeedsWork);
    }

    #[test]
    fn sentinel_and_empty_reasons_need_fallback() {
        assert!(needs_fallback_reason(""));
        assert!(needs_fallback_reason("DriftingNeutralFlowing"));
        assert!(needs_fallback_reason(
            "Generated fallback response from non-JSON output"
        ));
        assert!(!needs_fallback_reason("A genuine explanation."));
    }

    #[test]
    fn flow_threshold_is_exclusive() {
        assert!(!is_flow(0.2));
        assert!(is_flow(0.21));
    }
}
