//! Persisted result records.

use serde::{Deserialize, Serialize};

use super::variant::VariantTag;
use crate::choice::Choice;
use crate::dataset::QuestionId;

/// One graded answer for a (model, variant, question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: QuestionId,
    pub llm: String,
    #[serde(flatten)]
    pub variant: VariantTag,
    /// Trimmed model text, or `null` when the call failed.
    pub response: Option<String>,
    pub normalized_answer: Option<Choice>,
    pub correct_answer: Choice,
    pub is_correct: bool,
}

/// One sample of a self-consistency question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSample {
    pub raw_response: Option<String>,
    pub normalized: Option<Choice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfConsistencyRecord {
    pub id: QuestionId,
    pub llm: String,
    pub true_answer: Choice,
    pub voted_answer: Option<Choice>,
    pub is_correct: bool,
    pub runs: Vec<RunSample>,
}

/// Records that can be tallied.
pub trait Graded {
    fn llm(&self) -> &str;
    fn answer(&self) -> Option<Choice>;
    fn is_correct(&self) -> bool;
}

impl Graded for ResultRecord {
    fn llm(&self) -> &str {
        &self.llm
    }

    fn answer(&self) -> Option<Choice> {
        self.normalized_answer
    }

    fn is_correct(&self) -> bool {
        self.is_correct
    }
}

impl Graded for SelfConsistencyRecord {
    fn llm(&self) -> &str {
        &self.llm
    }

    fn answer(&self) -> Option<Choice> {
        self.voted_answer
    }

    fn is_correct(&self) -> bool {
        self.is_correct
    }
}
