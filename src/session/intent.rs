//! Message intent classification.
//!
//! A regex heuristic behind a pure interface, so orchestration code never
//! touches the patterns directly and the classifier can be swapped out
//! without changing the controller.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Plain conversation; replies go through the sanitization policy.
    None,
    /// An explicit request to generate a task plan.
    Generate,
    /// A modification or technical request; raw JSON is allowed in replies.
    Modify,
}

static GENERATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bregenerate\b|\bnew (?:plan|tasks)\b|\b(?:generate|create|build)(?:\s+\w+){0,3}\s+(?:task plans?|plans?|tasks?)\b",
    )
    .expect("generation pattern is valid")
});

static MODIFICATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:modify|update|change|edit|add|remove|reschedul\w*|deadline|priority|replace|replan|regenerate|generate|create|json|export)\b|\bnew (?:plan|tasks)\b",
    )
    .expect("modification pattern is valid")
});

/// Classifies a user message. Generation wins over modification; the
/// modification pattern is a superset used to decide whether raw JSON may
/// appear in the reply.
pub fn classify(text: &str) -> Intent {
    if GENERATION.is_match(text) {
        Intent::Generate
    } else if MODIFICATION.is_match(text) {
        Intent::Modify
    } else {
        Intent::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_generation_requests() {
        assert_eq!(classify("generate plan"), Intent::Generate);
        assert_eq!(classify("regenerate tasks"), Intent::Generate);
        assert_eq!(classify("please create a task plan"), Intent::Generate);
        assert_eq!(classify("generate a plan to learn piano"), Intent::Generate);
        assert_eq!(classify("I want new tasks"), Intent::Generate);
    }

    #[test]
    fn modification_requests() {
        assert_eq!(classify("modify the second task"), Intent::Modify);
        assert_eq!(classify("move the deadline up a week"), Intent::Modify);
        assert_eq!(classify("set the priority to high"), Intent::Modify);
        assert_eq!(classify("reschedule everything"), Intent::Modify);
    }

    #[test]
    fn plain_conversation_is_neither() {
        assert_eq!(classify("hello, how are you"), Intent::None);
        assert_eq!(classify("hi"), Intent::None);
        assert_eq!(classify("what should I focus on first?"), Intent::None);
    }

    #[test]
    fn generation_wins_over_modification() {
        // "regenerate" appears in both patterns
        assert_eq!(classify("regenerate the plan please"), Intent::Generate);
    }
}
