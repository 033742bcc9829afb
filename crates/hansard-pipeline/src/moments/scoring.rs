//! Deterministic virality rescoring
//!
//! The LLM proposes candidates; this module owns the score. Every factor is
//! computable from the candidate alone, so rescoring the same candidate
//! always yields the same number.

use hansard_core::ScoreBreakdown;

/// Bureaucratic vocabulary; matched case-insensitively as substrings so
/// inflected forms ("recalibrated") count
const JARGON_TERMS: &[&str] = &[
    "actuarial",
    "calibrate",
    "recalibrate",
    "framework",
    "optimise",
    "optimize",
    "paradigm",
    "synergy",
    "holistic",
    "stakeholder",
    "operationalise",
    "whole-of-government",
    "multi-ministry",
    "quantum",
    "fiscal prudence",
    "structural",
    "taskforce",
    "moving forward",
    "leverage",
    "robust",
    "in due course",
    "comprehensive review",
    "longer-term",
    "macroeconomic",
    "premium",
    "subvention",
    "means-tested",
    "downstream",
    "upstream",
    "baseline",
];

/// Matching this many distinct terms saturates the density at 1.0
const JARGON_SATURATION: usize = 3;

/// A quote containing any "first" word and any "second" word reads as a
/// position reversal
const CONTRADICTION_FIRST: &[&str] = &[
    "previously",
    "earlier",
    "before",
    "last year",
    "last time",
    "promised",
    "committed",
    "assured",
    "said",
];
const CONTRADICTION_SECOND: &[&str] = &[
    "however",
    "but",
    "now",
    "yet",
    "instead",
    "reversed",
    "changed",
    "no longer",
];

/// Topics whose effects reach daily life
const EVERYDAY_TOPICS: &[&str] = &[
    "healthcare",
    "health",
    "housing",
    "hdb",
    "bto",
    "transport",
    "mrt",
    "coe",
    "education",
    "school",
    "cost of living",
    "gst",
    "tax",
    "cpf",
    "retirement",
    "job",
    "employment",
    "wage",
    "childcare",
    "hawker",
    "utilities",
];

const HIGH_EMOTION_TONES: &[&str] = &["angry", "defensive", "evasive", "frustrated", "shocked"];
const MEDIUM_EMOTION_TONES: &[&str] = &["concerned", "worried", "skeptical"];

/// Fraction of the jargon vocabulary present in the quote, saturated
#[must_use]
pub fn jargon_density(quote: &str) -> f64 {
    let lower = quote.to_lowercase();
    let matches = JARGON_TERMS.iter().filter(|t| lower.contains(*t)).count();
    (matches as f64 / JARGON_SATURATION as f64).min(1.0)
}

/// Curated pair-matcher for position reversals
#[must_use]
pub fn has_contradiction_markers(quote: &str) -> bool {
    let lower = quote.to_lowercase();
    CONTRADICTION_FIRST.iter().any(|w| lower.contains(w))
        && CONTRADICTION_SECOND.iter().any(|w| lower.contains(w))
}

/// Word-count sweet spot: 15-40 words is ideal, very short and very long
/// quotes lose points
#[must_use]
pub fn quotability(word_count: usize) -> f64 {
    match word_count {
        0..=9 => 0.3,
        10..=14 => 0.3 + (word_count as f64 - 10.0) * (0.7 / 5.0),
        15..=40 => 1.0,
        41..=60 => 0.7,
        _ => 0.4,
    }
}

/// Topic match against the everyday-impact list
#[must_use]
pub fn everyday_topic(topic: &str) -> bool {
    let lower = topic.to_lowercase();
    EVERYDAY_TOPICS.iter().any(|t| lower.contains(t))
}

/// Emotional-tone factor
#[must_use]
pub fn emotion_factor(tone: &str) -> f64 {
    let lower = tone.to_lowercase();
    if HIGH_EMOTION_TONES.iter().any(|t| lower.contains(t)) {
        1.0
    } else if MEDIUM_EMOTION_TONES.iter().any(|t| lower.contains(t)) {
        0.6
    } else {
        0.3
    }
}

/// Rescore one candidate.
///
/// `final = min(10, ai*0.4 + jargon*2.0 + contradiction*2.0 + quotability
/// + everyday*1.5 + emotion*3.0)`
#[must_use]
pub fn score_candidate(
    quote: &str,
    topic: &str,
    emotional_tone: &str,
    ai_score: f64,
    has_contradiction: bool,
    affects_everyday_life: bool,
) -> ScoreBreakdown {
    let ai_score = ai_score.clamp(0.0, 10.0);
    let jargon = jargon_density(quote);
    let contradiction = has_contradiction || has_contradiction_markers(quote);
    let quotability = quotability(quote.split_whitespace().count());
    let everyday = affects_everyday_life || everyday_topic(topic);
    let emotion = emotion_factor(emotional_tone);

    let final_score = (ai_score * 0.4
        + jargon * 2.0
        + if contradiction { 2.0 } else { 0.0 }
        + quotability
        + if everyday { 1.5 } else { 0.0 }
        + emotion * 3.0)
        .min(10.0);

    ScoreBreakdown {
        ai_score,
        jargon_density: jargon,
        contradiction,
        quotability,
        everyday_impact: everyday,
        emotion,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_composition_for_defensive_healthcare_quote() {
        // 11 words, three jargon hits, defensive tone, everyday topic
        let quote =
            "We have recalibrated the actuarial framework to optimise healthcare premium affordability.";
        let b = score_candidate(quote, "Healthcare", "defensive", 7.0, false, true);

        assert!((b.jargon_density - 1.0).abs() < 1e-9);
        assert!(!b.contradiction);
        assert!(b.everyday_impact);
        assert!((b.emotion - 1.0).abs() < 1e-9);

        // 7*0.4 + 1.0*2 + 0 + quotability(11 words) + 1.5 + 3.0
        let words = quote.split_whitespace().count();
        let expected = 7.0 * 0.4 + 2.0 + quotability(words) + 1.5 + 3.0;
        assert!((b.final_score - expected).abs() < 1e-9);
        assert!(b.final_score > 7.5 && b.final_score <= 10.0);
    }

    #[test]
    fn quotability_sweet_spot_and_ramp() {
        assert!((quotability(5) - 0.3).abs() < 1e-9);
        assert!((quotability(10) - 0.3).abs() < 1e-9);
        assert!((quotability(12) - 0.58).abs() < 1e-9);
        assert!((quotability(15) - 1.0).abs() < 1e-9);
        assert!((quotability(40) - 1.0).abs() < 1e-9);
        assert!((quotability(50) - 0.7).abs() < 1e-9);
        assert!((quotability(80) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn contradiction_requires_a_pair() {
        assert!(has_contradiction_markers(
            "We previously promised this, but circumstances have changed."
        ));
        assert!(!has_contradiction_markers("We previously promised this."));
        assert!(!has_contradiction_markers("But now we act."));
    }

    #[test]
    fn emotion_tiers() {
        assert!((emotion_factor("Defensive") - 1.0).abs() < 1e-9);
        assert!((emotion_factor("worried") - 0.6).abs() < 1e-9);
        assert!((emotion_factor("neutral") - 0.3).abs() < 1e-9);
    }

    #[test]
    fn everyday_topic_substring_match() {
        assert!(everyday_topic("Public Housing Supply"));
        assert!(everyday_topic("COE Quota Review"));
        assert!(!everyday_topic("Diplomatic Relations"));
    }

    #[test]
    fn score_is_bounded_and_deterministic() {
        let b1 = score_candidate(
            "Previously we promised lower premiums but now the framework has changed entirely for healthcare and housing and transport costs.",
            "Cost of Living",
            "angry",
            10.0,
            true,
            true,
        );
        let b2 = score_candidate(
            "Previously we promised lower premiums but now the framework has changed entirely for healthcare and housing and transport costs.",
            "Cost of Living",
            "angry",
            10.0,
            true,
            true,
        );
        assert!(b1.final_score <= 10.0);
        assert!((b1.final_score - b2.final_score).abs() < 1e-12);
    }

    #[test]
    fn ai_score_is_clamped() {
        let b = score_candidate("short", "x", "neutral", 42.0, false, false);
        assert!((b.ai_score - 10.0).abs() < 1e-9);
        let b = score_candidate("short", "x", "neutral", -3.0, false, false);
        assert!(b.ai_score.abs() < 1e-9);
    }
}
