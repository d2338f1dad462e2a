//! Variant axes: shot count, example order, prompt style.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ExperimentError;
use crate::dataset::{FewShotExample, Question};
use crate::prompts::{self, PromptInstance};

/// A named permutation of the leading examples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleOrder {
    pub name: String,
    pub indices: Vec<usize>,
}

impl ExampleOrder {
    pub fn new(name: impl Into<String>, indices: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            indices,
        }
    }

    /// `orderA` as given, `orderB` reversed, `orderC` interleaved; all over
    /// the first five examples.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("orderA", vec![0, 1, 2, 3, 4]),
            Self::new("orderB", vec![4, 3, 2, 1, 0]),
            Self::new("orderC", vec![2, 0, 3, 1, 4]),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    Standard,
    Role,
}

impl PromptStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStyle::Standard => "standard",
            PromptStyle::Role => "role",
        }
    }
}

/// One point on an experiment's variant axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Shots(usize),
    Order(ExampleOrder),
    Style(PromptStyle),
}

/// How a variant is recorded on each result: `"shot": 2`, `"order": "orderA"`
/// or `"prompt_type": "role"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantTag {
    Shot(usize),
    Order(String),
    PromptType(PromptStyle),
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantTag::Shot(n) => write!(f, "{n}shot"),
            VariantTag::Order(name) => f.write_str(name),
            VariantTag::PromptType(style) => f.write_str(style.as_str()),
        }
    }
}

impl Variant {
    pub fn tag(&self) -> VariantTag {
        match self {
            Variant::Shots(n) => VariantTag::Shot(*n),
            Variant::Order(order) => VariantTag::Order(order.name.clone()),
            Variant::Style(style) => VariantTag::PromptType(*style),
        }
    }

    /// Label used in progress lines.
    pub fn label(&self) -> String {
        match self {
            Variant::Shots(n) => format!("{n}-shot"),
            other => other.tag().to_string(),
        }
    }

    /// Result file for one model under this variant.
    pub fn file_name(&self, llm: &str) -> String {
        let prefix = match self {
            Variant::Style(_) => "v1_",
            _ => "",
        };
        format!("{prefix}results_{llm}_{}.json", self.tag())
    }

    pub fn validate(&self, examples: &[FewShotExample]) -> Result<(), ExperimentError> {
        match self {
            Variant::Shots(n) if *n > examples.len() => {
                tracing::warn!(
                    shots = n,
                    available = examples.len(),
                    "not enough examples; {n}-shot prompts use all {}",
                    examples.len()
                );
                Ok(())
            }
            Variant::Order(order) => {
                if order.indices.is_empty() {
                    return Err(ExperimentError::InvalidPlan(format!(
                        "order {} has no examples",
                        order.name
                    )));
                }
                match order.indices.iter().find(|&&i| i >= examples.len()) {
                    Some(i) => Err(ExperimentError::InvalidPlan(format!(
                        "order {} uses example {i}, only {} loaded",
                        order.name,
                        examples.len()
                    ))),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Render the prompt for `q`. Call [`Variant::validate`] first.
    pub fn prompt(&self, q: &Question, examples: &[FewShotExample], role: &str) -> PromptInstance {
        match self {
            Variant::Shots(n) => prompts::few_shot(q, &examples[..(*n).min(examples.len())]),
            Variant::Order(order) => {
                prompts::few_shot(q, order.indices.iter().map(|&i| &examples[i]))
            }
            Variant::Style(PromptStyle::Standard) => prompts::standard(q),
            Variant::Style(PromptStyle::Role) => prompts::role_primed(q, role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Choice;

    fn examples(n: usize) -> Vec<FewShotExample> {
        (0..n)
            .map(|i| {
                Question::new(
                    i as u64 + 1,
                    format!("Example {i}?"),
                    [(Choice::A, "x".to_string()), (Choice::B, "y".to_string())],
                    Choice::A,
                )
            })
            .collect()
    }

    #[test]
    fn file_names_follow_result_layout() {
        assert_eq!(
            Variant::Shots(5).file_name("gpt-3.5-turbo"),
            "results_gpt-3.5-turbo_5shot.json"
        );
        assert_eq!(
            Variant::Order(ExampleOrder::defaults()[1].clone()).file_name("gpt-3.5-turbo"),
            "results_gpt-3.5-turbo_orderB.json"
        );
        assert_eq!(
            Variant::Style(PromptStyle::Role).file_name("claude-3-5-sonnet"),
            "v1_results_claude-3-5-sonnet_role.json"
        );
    }

    #[test]
    fn tags_serialize_as_single_field() {
        let json = serde_json::to_value(VariantTag::Shot(2)).unwrap();
        assert_eq!(json, serde_json::json!({"shot": 2}));
        let json = serde_json::to_value(VariantTag::PromptType(PromptStyle::Standard)).unwrap();
        assert_eq!(json, serde_json::json!({"prompt_type": "standard"}));
    }

    #[test]
    fn validation_checks_example_pool() {
        let pool = examples(5);
        assert!(Variant::Shots(5).validate(&pool).is_ok());
        for order in ExampleOrder::defaults() {
            assert!(Variant::Order(order).validate(&pool).is_ok());
        }
        let out_of_range = ExampleOrder::new("orderZ", vec![0, 7]);
        assert!(Variant::Order(out_of_range).validate(&pool).is_err());
    }

    #[test]
    fn order_prompt_follows_permutation() {
        let pool = examples(5);
        let q = Question::new(99u64, "Target?", [(Choice::A, "x".to_string())], Choice::A);
        let order = ExampleOrder::defaults()[2].clone();
        let p = Variant::Order(order).prompt(&q, &pool, "");

        let positions: Vec<usize> = [2, 0, 3, 1, 4]
            .iter()
            .map(|i| p.user.find(&format!("Example {i}?")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn oversized_shot_count_uses_whole_pool() {
        let pool = examples(3);
        let ten = Variant::Shots(10);
        assert!(ten.validate(&pool).is_ok());

        let q = Question::new(1u64, "Target?", [(Choice::A, "x".to_string())], Choice::A);
        let p = ten.prompt(&q, &pool, "");
        assert_eq!(p.user, Variant::Shots(3).prompt(&q, &pool, "").user);
        assert_eq!(ten.file_name("gpt-3.5-turbo"), "results_gpt-3.5-turbo_10shot.json");
    }

    #[test]
    fn zero_shot_uses_no_examples() {
        let pool = examples(3);
        let q = Question::new(1u64, "Target?", [(Choice::A, "x".to_string())], Choice::A);
        let p = Variant::Shots(0).prompt(&q, &pool, "");
        assert!(!p.user.contains("Example"));
    }
}
