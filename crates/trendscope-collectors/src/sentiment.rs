//! Bag-of-words polarity over English and French term lists.

const POSITIVE_TERMS: &[&str] = &[
    // English
    "love", "great", "amazing", "awesome", "excellent", "perfect", "beautiful", "fantastic",
    "wonderful", "best", "good", "happy", "fun", "incredible",
    // French
    "adore", "super", "génial", "genial", "incroyable", "parfait", "parfaite", "magnifique",
    "bravo", "top", "merci", "heureux",
];

const NEGATIVE_TERMS: &[&str] = &[
    // English
    "hate", "bad", "terrible", "awful", "horrible", "worst", "poor", "disappointing",
    "useless", "waste", "boring", "sad",
    // French
    "déteste", "deteste", "nul", "nulle", "mauvais", "mauvaise", "décevant", "decevant",
    "ennuyeux", "triste", "pire",
];

/// Polarity in `[0, 1]`: `positive / (positive + negative)` over matched
/// words, `0.5` when no known term appears.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn polarity(text: &str) -> f64 {
    let mut positive = 0_u32;
    let mut negative = 0_u32;

    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if w.is_empty() {
            continue;
        }
        // "j'adore" and "l'excellent" carry the term after the apostrophe.
        let w = w.rsplit(['\'', '’']).next().unwrap_or(&w);
        if POSITIVE_TERMS.contains(&w) {
            positive += 1;
        } else if NEGATIVE_TERMS.contains(&w) {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        return 0.5;
    }
    f64::from(positive) / f64::from(total)
}

/// Map a `[0, 1]` polarity onto the signed `[-1, 1]` score stored on trends.
#[must_use]
pub fn signed_score(polarity: f64) -> f64 {
    (polarity * 2.0 - 1.0).clamp(-1.0, 1.0)
}
