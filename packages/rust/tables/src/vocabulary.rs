//! Calculation labels.
//!
//! Deciding whether a cell is a calculation label is a heuristic, so it sits
//! behind the [`LabelMatcher`] trait. [`Vocabulary`] is the default: an exact
//! match of the normalized cell text against a table of terms.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;

use draftsmith_shared::{DraftsmithError, Result, TablesConfig};

/// The arithmetic a label asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Sum,
    Difference,
    Average,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Difference => "difference",
            Self::Average => "average",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DraftsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(Self::Sum),
            "difference" => Ok(Self::Difference),
            "average" => Ok(Self::Average),
            other => Err(DraftsmithError::validation(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

/// Decides whether a cell's text is a calculation label.
pub trait LabelMatcher: Send + Sync {
    fn matches(&self, text: &str) -> Option<Operation>;
}

impl<F> LabelMatcher for F
where
    F: Fn(&str) -> Option<Operation> + Send + Sync,
{
    fn matches(&self, text: &str) -> Option<Operation> {
        self(text)
    }
}

/// Built-in terms.
const DEFAULT_TERMS: [(&str, Operation); 6] = [
    ("total", Operation::Sum),
    ("sum", Operation::Sum),
    ("difference", Operation::Difference),
    ("delta", Operation::Difference),
    ("average", Operation::Average),
    ("mean", Operation::Average),
];

/// Exact-match label vocabulary.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: HashMap<String, Operation>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            terms: DEFAULT_TERMS
                .iter()
                .map(|(term, op)| (term.to_string(), *op))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Add (or override) a term.
    pub fn with_term(mut self, term: &str, op: Operation) -> Self {
        self.terms.insert(normalize_label(term), op);
        self
    }

    /// Built-in terms plus the configured extras.
    pub fn from_config(config: &TablesConfig) -> Result<Self> {
        let mut vocab = Self::default();
        for (term, op) in &config.vocabulary {
            vocab = vocab.with_term(term, op.parse()?);
        }
        Ok(vocab)
    }
}

impl LabelMatcher for Vocabulary {
    fn matches(&self, text: &str) -> Option<Operation> {
        self.terms.get(&normalize_label(text)).copied()
    }
}

/// Lowercase, trim, drop a trailing colon, collapse inner whitespace.
pub fn normalize_label(text: &str) -> String {
    text.trim()
        .trim_end_matches(':')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_terms_match_case_insensitively() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.matches("Total"), Some(Operation::Sum));
        assert_eq!(vocab.matches("  SUM: "), Some(Operation::Sum));
        assert_eq!(vocab.matches("Delta"), Some(Operation::Difference));
        assert_eq!(vocab.matches("mean"), Some(Operation::Average));
    }

    #[test]
    fn match_is_whole_text_only() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.matches("Total revenue"), None);
        assert_eq!(vocab.matches("subtotal"), None);
        assert_eq!(vocab.matches(""), None);
    }

    #[test]
    fn config_terms_extend_vocabulary() {
        let mut config = TablesConfig::default();
        config.vocabulary.insert("Variance".into(), "difference".into());
        config.vocabulary.insert("grand  total".into(), "sum".into());

        let vocab = Vocabulary::from_config(&config).expect("valid vocabulary");
        assert_eq!(vocab.matches("variance"), Some(Operation::Difference));
        assert_eq!(vocab.matches("Grand Total"), Some(Operation::Sum));
        assert_eq!(vocab.matches("total"), Some(Operation::Sum));
    }

    #[test]
    fn config_rejects_unknown_operation() {
        let mut config = TablesConfig::default();
        config.vocabulary.insert("median".into(), "median".into());
        assert!(Vocabulary::from_config(&config).is_err());
    }

    #[test]
    fn closures_are_matchers() {
        let matcher = |text: &str| (text == "Σ").then_some(Operation::Sum);
        assert_eq!(matcher.matches("Σ"), Some(Operation::Sum));
        assert_eq!(matcher.matches("Total"), None);
    }
}
