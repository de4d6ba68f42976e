// SPDX-License-Identifier: MIT

//! Structured outputs produced by the model backend

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing an extracted answer with the human-labeled one
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Judgment {
    Yes,
    No,
    Partial,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Yes => "YES",
            Judgment::No => "NO",
            Judgment::Partial => "PARTIAL",
        }
    }

    /// Parse a stored judgement; unknown values yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "YES" => Some(Judgment::Yes),
            "NO" => Some(Judgment::No),
            "PARTIAL" => Some(Judgment::Partial),
            _ => None,
        }
    }

    /// YES and PARTIAL both count as an acceptable match
    pub fn is_match(&self) -> bool {
        matches!(self, Judgment::Yes | Judgment::Partial)
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct InstructionsOutput {
    pub initial_ai_instructions: String,
    pub reasoning_explanation: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct VerificationOutput {
    pub verified_instructions: String,
    pub verification_report: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ExtractionOutput {
    pub extracted_answer: String,
    pub extraction_reasoning: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EvaluationOutput {
    pub judgment: Judgment,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RefinementOutput {
    pub refined_instructions: String,
    pub refinement_reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_judgment_parse() {
        assert_eq!(Judgment::parse("YES"), Some(Judgment::Yes));
        assert_eq!(Judgment::parse(" partial "), Some(Judgment::Partial));
        assert_eq!(Judgment::parse("maybe"), None);
    }

    #[test]
    fn test_judgment_serde_uppercase() {
        let output: EvaluationOutput =
            serde_json::from_value(json!({"judgment": "PARTIAL", "reasoning": "close"})).unwrap();
        assert_eq!(output.judgment, Judgment::Partial);
        assert_eq!(serde_json::to_value(Judgment::No).unwrap(), json!("NO"));
    }

    #[test]
    fn test_judgment_is_match() {
        assert!(Judgment::Yes.is_match());
        assert!(Judgment::Partial.is_match());
        assert!(!Judgment::No.is_match());
    }
}
