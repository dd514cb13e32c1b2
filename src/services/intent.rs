use crate::models::Intent;

const BOOK_KEYWORDS: [&str; 3] = ["book", "schedule", "reserve"];
const CHECK_KEYWORDS: [&str; 5] = ["check", "free", "available", "availability", "status"];
const CANCEL_KEYWORDS: [&str; 1] = ["cancel"];

const AFFIRM_WORDS: [&str; 10] = [
    "yes", "yeah", "yep", "sure", "ok", "okay", "confirm", "confirmed", "correct", "right",
];
const NEGATE_WORDS: [&str; 6] = ["no", "nope", "nah", "wrong", "change", "incorrect"];

fn words(utterance: &str) -> Vec<String> {
    utterance
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn matches_any(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|w| keywords.contains(&w.as_str()))
}

/// Classifies an utterance into one of the three intents. Returns `None`
/// when no keyword group matches, or when more than one does — the caller
/// re-prompts rather than guessing.
pub fn resolve(utterance: &str) -> Option<Intent> {
    let words = words(utterance);

    let mut matched = Vec::new();
    if matches_any(&words, &CANCEL_KEYWORDS) {
        matched.push(Intent::Cancel);
    }
    if matches_any(&words, &CHECK_KEYWORDS) {
        matched.push(Intent::Check);
    }
    if matches_any(&words, &BOOK_KEYWORDS) {
        matched.push(Intent::Book);
    }

    match matched.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// A yes to a confirmation or an offer.
pub fn is_affirmative(utterance: &str) -> bool {
    matches_any(&words(utterance), &AFFIRM_WORDS)
}

/// A no, or a request to change something.
pub fn is_negative(utterance: &str) -> bool {
    matches_any(&words(utterance), &NEGATE_WORDS)
}

/// The caller wants to drop the current flow and begin again.
pub fn wants_restart(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    lower.contains("start over") || lower.contains("start again") || lower.contains("restart")
}

/// The caller is done, nothing further expected.
pub fn wants_to_leave(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    if ["never mind", "nevermind", "forget it"]
        .iter()
        .any(|p| lower.contains(p))
    {
        return true;
    }
    matches_any(&words(utterance), &["goodbye", "bye"])
}
