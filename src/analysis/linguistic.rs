//! Formality, tone, and a 128-dim writing-style vector from a single body
//! of text (spec §4.6). No sentiment crate exists in the example pack, so
//! the tone scorer is a small hand-written VADER-style lexicon lookup,
//! grounded on the same closed-set-matching approach the formality scorer
//! uses.

use crate::model::{Formality, LinguisticStyle, Tone};
use regex::Regex;
use std::sync::OnceLock;

const STYLE_VECTOR_LEN: usize = 128;

const INFORMAL_MARKERS: &[&str] = &[
    "gonna", "wanna", "kinda", "sorta", "lol", "btw", "fyi", "hey", "yo", "what's up", "dude",
];

/// Runs the full analysis described in §4.6 over the concatenated sample
/// text for a job.
pub fn analyze(text: &str) -> LinguisticStyle {
    let tokens = tokenize(text);
    let (formality, formality_confidence) = score_formality(text, &tokens);
    let (tone, tone_confidence) = score_tone(text);
    let writing_style_vector = style_vector(&tokens);

    LinguisticStyle {
        overall_formality: formality,
        formality_confidence_score: formality_confidence,
        dominant_tone: tone,
        tone_confidence_score: tone_confidence,
        writing_style_vector,
    }
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[\p{L}\p{M}']+\b").unwrap())
}

fn contraction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\w+)'(re|ve|ll|d|m|s|t)\b").unwrap())
}

fn tokenize(text: &str) -> Vec<String> {
    word_regex().find_iter(text).map(|m| m.as_str().to_string()).collect()
}

fn score_formality(text: &str, tokens: &[String]) -> (Formality, f64) {
    let w = (tokens.len() as f64).max(1.0);

    let contraction_count = contraction_regex().find_iter(text).count() as f64;

    let informal_count = tokens
        .iter()
        .filter(|t| INFORMAL_MARKERS.contains(&t.to_lowercase().as_str()))
        .count() as f64
        + if text.to_lowercase().contains("what's up") { 1.0 } else { 0.0 };

    let uppercase_count = tokens
        .iter()
        .filter(|t| t.len() > 1 && t.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()))
        .count() as f64;

    let mut score = 1.0
        - (contraction_count / w) * 0.8
        - (informal_count / w * 2.0).min(0.8)
        - ((uppercase_count / w) * 0.3).min(0.3);
    score = score.clamp(0.0, 1.0);

    let formality = if score >= 0.55 { Formality::Formal } else { Formality::Informal };
    let confidence = ((score - 0.5).abs() * 2.0).clamp(0.1, 1.0);
    (formality, round3(confidence))
}

/// Small hand-rolled sentiment lexicon (positive/negative word lists with
/// intensity weights) standing in for a dedicated sentiment-intensity
/// library, producing a compound score in `[-1, 1]` the same shape a
/// VADER-style analyzer would (spec §4.6 "delegated to a sentiment-
/// intensity analyzer").
fn score_tone(text: &str) -> (Tone, f64) {
    const POSITIVE: &[(&str, f64)] = &[
        ("love", 3.0), ("great", 2.7), ("amazing", 3.2), ("excellent", 3.0),
        ("good", 2.0), ("happy", 2.5), ("best", 2.8), ("awesome", 3.1),
        ("wonderful", 2.9), ("fantastic", 3.0), ("crush", 1.8), ("achieved", 1.5),
        ("success", 2.0), ("strategic", 1.0), ("win", 2.0), ("excited", 2.3),
    ];
    const NEGATIVE: &[(&str, f64)] = &[
        ("hate", -3.0), ("terrible", -2.8), ("bad", -2.0), ("awful", -3.0),
        ("worst", -3.0), ("fail", -2.3), ("failure", -2.5), ("angry", -2.6),
        ("broken", -1.8), ("disappointed", -2.2), ("problem", -1.2), ("issue", -0.8),
    ];

    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = word_regex().find_iter(&lowered).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return (Tone::Neutral, round3(0.05));
    }

    let mut sum = 0.0;
    for token in &tokens {
        if let Some((_, weight)) = POSITIVE.iter().find(|(w, _)| w == token) {
            sum += weight;
        } else if let Some((_, weight)) = NEGATIVE.iter().find(|(w, _)| w == token) {
            sum += weight;
        }
    }
    if text.contains('!') {
        sum *= 1.1;
    }

    let normalizer = (sum.abs() + 5.0).sqrt().max(1.0);
    let compound = (sum / normalizer).clamp(-1.0, 1.0);

    let tone = if compound > 0.25 {
        Tone::Positive
    } else if compound < -0.25 {
        Tone::Negative
    } else {
        Tone::Neutral
    };
    (tone, round3(compound.abs().clamp(0.05, 1.0)))
}

/// Stable 64-bit FNV-1a hash; the spec explicitly leaves the hash function
/// unspecified and forbids asserting specific indices (§4.6).
fn stable_hash(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn style_vector(tokens: &[String]) -> Vec<f64> {
    let mut vec = vec![0.0; STYLE_VECTOR_LEN];
    for token in tokens {
        let lower = token.to_lowercase();
        let bucket_a = (stable_hash(&lower) % STYLE_VECTOR_LEN as u64) as usize;
        vec[bucket_a] += 1.0;

        let char_sum: u64 = lower.bytes().map(|b| b as u64).sum();
        let bucket_b = ((char_sum + lower.len() as u64) % STYLE_VECTOR_LEN as u64) as usize;
        vec[bucket_b] += 0.5;
    }

    let magnitude = vec.iter().map(|v| v * v).sum::<f64>().sqrt();
    if magnitude > 0.0 {
        for v in vec.iter_mut() {
            *v /= magnitude;
        }
    }
    vec
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formal_statement_scores_formal_with_confidence_above_half() {
        let text = "Dear Board Members, the engineering division has achieved every strategic objective for this fiscal year.";
        let style = analyze(text);
        assert_eq!(style.overall_formality, Formality::Formal);
        assert!(style.formality_confidence_score > 0.5);
    }

    #[test]
    fn casual_excited_statement_scores_informal_and_positive() {
        let text = "Hey team! We're gonna crush it this quarter and the vibe is absolutely amazing lol!";
        let style = analyze(text);
        assert_eq!(style.overall_formality, Formality::Informal);
        assert_eq!(style.dominant_tone, Tone::Positive);
        assert!(style.tone_confidence_score > 0.3);
    }

    #[test]
    fn style_vector_is_always_128_long_and_unit_norm_when_nonempty() {
        let style = analyze("A handful of ordinary words in a plain sentence.");
        assert_eq!(style.writing_style_vector.len(), STYLE_VECTOR_LEN);
        let norm: f64 = style.writing_style_vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_input_yields_zero_vector() {
        let style = analyze("");
        assert_eq!(style.writing_style_vector.len(), STYLE_VECTOR_LEN);
        assert!(style.writing_style_vector.iter().all(|v| *v == 0.0));
    }
}
