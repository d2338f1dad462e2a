//! Question set and few-shot example loading.
//!
//! Both files share one shape: a JSON array of
//! `{"id": 1, "question": "...", "options": {"a": "...", ...}, "answer": "b"}`.
//! Records without an `id` get their 1-based position in the file.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::choice::Choice;

/// Question identity as found in the dataset (numbers and strings both occur).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(u64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) => write!(f, "{n}"),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for QuestionId {
    fn from(n: u64) -> Self {
        QuestionId::Number(n)
    }
}

/// A scored multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    /// Keyed by letter; file order is not kept.
    pub options: BTreeMap<Choice, String>,
    pub answer: Choice,
}

/// Worked examples have the same shape; they are never scored.
pub type FewShotExample = Question;

impl Question {
    pub fn new(
        id: impl Into<QuestionId>,
        question: impl Into<String>,
        options: impl IntoIterator<Item = (Choice, String)>,
        answer: Choice,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            options: options.into_iter().collect(),
            answer,
        }
    }
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<QuestionId>,
    question: String,
    options: BTreeMap<Choice, String>,
    answer: Choice,
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("question {id} has no options")]
    NoOptions { id: QuestionId },
    #[error("question {id}: answer '{answer}' is not one of its options")]
    AnswerNotInOptions { id: QuestionId, answer: Choice },
    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
}

/// Load and validate a question file.
pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<Question>, DatasetError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_questions(&raw).map_err(|err| match err {
        ParseError::Json(source) => DatasetError::Json {
            path: path.to_path_buf(),
            source,
        },
        ParseError::Invalid(err) => err,
    })
}

/// Few-shot examples are validated the same way as questions.
pub fn load_examples(path: impl AsRef<Path>) -> Result<Vec<FewShotExample>, DatasetError> {
    load_questions(path)
}

enum ParseError {
    Json(serde_json::Error),
    Invalid(DatasetError),
}

fn parse_questions(raw: &str) -> Result<Vec<Question>, ParseError> {
    let records: Vec<RawQuestion> = serde_json::from_str(raw).map_err(ParseError::Json)?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut questions = Vec::with_capacity(records.len());

    for (idx, record) in records.into_iter().enumerate() {
        let id = record
            .id
            .unwrap_or_else(|| QuestionId::Number(idx as u64 + 1));

        if record.options.is_empty() {
            return Err(ParseError::Invalid(DatasetError::NoOptions { id }));
        }
        if !record.options.contains_key(&record.answer) {
            return Err(ParseError::Invalid(DatasetError::AnswerNotInOptions {
                id,
                answer: record.answer,
            }));
        }
        if !seen.insert(id.clone()) {
            return Err(ParseError::Invalid(DatasetError::DuplicateId(id)));
        }

        questions.push(Question {
            id,
            question: record.question,
            options: record.options,
            answer: record.answer,
        });
    }

    Ok(questions)
}
