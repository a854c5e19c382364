//! Keyword and length based query classifier.
//!
//! Assigns every query to exactly one [`Tier`] with no network calls and no
//! state. Rules are checked in order and the first match wins:
//!
//! 1. a complex keyword, or more than 50 words -> `Complex`
//! 2. a medium keyword -> `Medium`
//! 3. 15..=50 words -> `Medium`
//! 4. fewer than 15 words and a simple keyword -> `Simple`
//! 5. fewer than 10 words -> `Simple`
//! 6. otherwise -> `Medium`
//!
//! Keywords are plain substrings of the lowercased text, so "hi" matches
//! inside "this". That looseness is part of the heuristic.

use polyroute_types::Tier;

/// Word count above which a query is always complex.
pub const COMPLEX_WORD_THRESHOLD: usize = 50;

/// Lower bound (inclusive) of the length-based medium band.
pub const MEDIUM_WORD_THRESHOLD: usize = 15;

/// Queries shorter than this are simple even without a keyword.
pub const SHORT_WORD_THRESHOLD: usize = 10;

/// A keyword set for one tier.
struct KeywordPattern {
    keywords: &'static [&'static str],
    tier: Tier,
}

const COMPLEX: KeywordPattern = KeywordPattern {
    keywords: &[
        "analyze deeply",
        "detailed plan",
        "step-by-step reasoning",
        "pros and cons",
        "comprehensive analysis",
        "in-depth",
        "elaborate",
        "thorough explanation",
        "detailed breakdown",
        "critically evaluate",
        "comprehensive",
        "architecture",
        "scalable",
        "microservices",
    ],
    tier: Tier::Complex,
};

const MEDIUM: KeywordPattern = KeywordPattern {
    keywords: &[
        "explain",
        "compare",
        "how does",
        "steps",
        "list",
        "describe",
        "outline",
        "summarize",
        "analyze",
        "why",
        "how to",
        "difference",
        "what are",
        "tell me about",
        "show me",
        "can you",
    ],
    tier: Tier::Medium,
};

const SIMPLE: KeywordPattern = KeywordPattern {
    keywords: &[
        "what is", "define", "who is", "when", "where", "time", "date", "capital", "yes", "no",
        "true", "false", "hi", "hello", "hey", "thanks", "thank you",
    ],
    tier: Tier::Simple,
};

impl KeywordPattern {
    /// First keyword contained in `lower`, if any.
    fn find(&self, lower: &str) -> Option<&'static str> {
        self.keywords.iter().copied().find(|kw| lower.contains(kw))
    }
}

/// Outcome of classifying one query, with the evidence used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The chosen tier.
    pub tier: Tier,
    /// Whitespace-delimited token count.
    pub word_count: usize,
    /// Keyword that decided the tier, if a keyword rule fired.
    pub matched: Option<&'static str>,
}

/// Classify a query and report why.
pub fn analyze(text: &str) -> Classification {
    let lower = text.to_lowercase();
    let word_count = text.split_whitespace().count();
    let decided = |tier: Tier, matched: Option<&'static str>| Classification {
        tier,
        word_count,
        matched,
    };

    if let Some(kw) = COMPLEX.find(&lower) {
        return decided(COMPLEX.tier, Some(kw));
    }
    if word_count > COMPLEX_WORD_THRESHOLD {
        return decided(Tier::Complex, None);
    }
    if let Some(kw) = MEDIUM.find(&lower) {
        return decided(MEDIUM.tier, Some(kw));
    }
    if word_count >= MEDIUM_WORD_THRESHOLD {
        return decided(Tier::Medium, None);
    }
    if let Some(kw) = SIMPLE.find(&lower) {
        return decided(SIMPLE.tier, Some(kw));
    }
    if word_count < SHORT_WORD_THRESHOLD {
        return decided(Tier::Simple, None);
    }
    decided(Tier::Medium, None)
}

/// Classify a query.
pub fn classify(text: &str) -> Tier {
    analyze(text).tier
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` words that contain no keyword from any set.
    fn filler(n: usize) -> String {
        vec!["zebra"; n].join(" ")
    }

    #[test]
    fn greeting_is_simple() {
        let c = analyze("hi");
        assert_eq!(c.tier, Tier::Simple);
        assert_eq!(c.word_count, 1);
        assert_eq!(c.matched, Some("hi"));
    }

    #[test]
    fn explain_is_medium() {
        let c = analyze("explain how caching works");
        assert_eq!(c.tier, Tier::Medium);
        assert_eq!(c.matched, Some("explain"));
    }

    #[test]
    fn long_text_without_keywords_is_complex() {
        let c = analyze(&filler(60));
        assert_eq!(c.tier, Tier::Complex);
        assert_eq!(c.word_count, 60);
        assert_eq!(c.matched, None);
    }

    #[test]
    fn length_dominates_medium_and_simple_keywords() {
        let text = format!("explain hello {}", filler(55));
        assert_eq!(classify(&text), Tier::Complex);
    }

    #[test]
    fn complex_keyword_wins_on_short_text() {
        let c = analyze("Design a SCALABLE system");
        assert_eq!(c.tier, Tier::Complex);
        assert_eq!(c.matched, Some("scalable"));
    }

    #[test]
    fn medium_keyword_beats_simple_keyword() {
        // "what is" is simple, "why" is medium.
        assert_eq!(classify("what is it and why"), Tier::Medium);
    }

    #[test]
    fn word_count_band_boundaries() {
        assert_eq!(classify(&filler(50)), Tier::Medium);
        assert_eq!(classify(&filler(51)), Tier::Complex);
        assert_eq!(classify(&filler(15)), Tier::Medium);
        assert_eq!(classify(&filler(14)), Tier::Medium);
        assert_eq!(classify(&filler(10)), Tier::Medium);
        assert_eq!(classify(&filler(9)), Tier::Simple);
    }

    #[test]
    fn simple_keyword_under_fifteen_words() {
        let text = format!("capital {}", filler(12));
        assert_eq!(classify(&text), Tier::Simple);
    }

    #[test]
    fn keyword_matching_is_substring() {
        // "no" inside "piano"
        assert_eq!(analyze(&format!("piano {}", filler(11))).matched, Some("no"));
    }

    #[test]
    fn empty_text_is_simple() {
        let c = analyze("");
        assert_eq!(c.tier, Tier::Simple);
        assert_eq!(c.word_count, 0);
    }

    #[test]
    fn deterministic() {
        let q = "Tell me about the difference between TCP and UDP";
        let first = analyze(q);
        for _ in 0..10 {
            assert_eq!(analyze(q), first);
        }
    }
}
