//! Prompt templates for multiple-choice questions.
//!
//! Every prompt ends in a bare `Answer:` cue and is sent as a single user
//! message. Provider-agnostic.

use std::collections::BTreeMap;

use crate::choice::Choice;
use crate::dataset::{FewShotExample, Question};
use crate::gateway::Message;

/// Persona used by the role-priming experiment.
pub const DEFAULT_ROLE: &str = "You are a highly experienced AWS Cloud Practitioner Trainer with 10+ years of industry experience. Your job is to help students pass the AWS Cloud Practitioner certification by identifying the most accurate, factual, and AWS-aligned answer choices. Always choose the single best answer based strictly on AWS documentation and best practices. Do not explain your answer. Only respond with the letter of the correct option (a, b, c, or d).";

/// Rendered prompt ready for LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInstance {
    pub template_slug: &'static str,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::user(self.user.as_str())]
    }
}

/// One `key) text` line per option.
///
/// Options always render a, b, c, d, whatever order the dataset file lists
/// them in.
pub fn format_options(options: &BTreeMap<Choice, String>) -> String {
    options
        .iter()
        .map(|(key, text)| format!("{key}) {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A worked example with its answer filled in.
pub fn format_example(example: &FewShotExample) -> String {
    format!(
        "Question:\n{}\n{}\nAnswer: {}",
        example.question,
        format_options(&example.options),
        example.answer
    )
}

fn question_block(q: &Question) -> String {
    format!("Question:\n{}\n{}\nAnswer:", q.question, format_options(&q.options))
}

fn bare_block(q: &Question) -> String {
    format!("{}\n{}\nAnswer:", q.question, format_options(&q.options))
}

/// Worked examples, in the given order, followed by the target question.
///
/// With no examples this is the zero-shot prompt.
pub fn few_shot<'a>(
    q: &Question,
    examples: impl IntoIterator<Item = &'a FewShotExample>,
) -> PromptInstance {
    let shots: Vec<String> = examples.into_iter().map(format_example).collect();
    let user = if shots.is_empty() {
        question_block(q)
    } else {
        format!("{}\n\n{}", shots.join("\n\n"), question_block(q))
    };
    PromptInstance {
        template_slug: if shots.is_empty() { "zero_shot" } else { "few_shot" },
        user,
    }
}

/// The question and options with no framing.
pub fn standard(q: &Question) -> PromptInstance {
    PromptInstance {
        template_slug: "standard",
        user: bare_block(q),
    }
}

/// A persona paragraph ahead of the question.
pub fn role_primed(q: &Question, role: &str) -> PromptInstance {
    PromptInstance {
        template_slug: "role",
        user: format!("{}\n\n{}", role.trim(), question_block(q)),
    }
}

/// Prompt repeated for each self-consistency sample.
pub fn self_consistency(q: &Question) -> PromptInstance {
    PromptInstance {
        template_slug: "self_consistency",
        user: bare_block(q),
    }
}

// =============================================================================
// TESTS
// =============================================================================
