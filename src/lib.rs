#![forbid(unsafe_code)]

//! # choice-harness
//!
//! Prompting-strategy experiments on multiple-choice question sets.
//!
//! Each experiment sends questions to hosted chat models under several prompt
//! variants (zero/few-shot, example order, role priming, self-consistency
//! sampling), recovers the chosen letter from free-form output with an
//! ordered regex cascade, grades it against the answer key, and writes one
//! JSON result file per (model, variant).
//!
//! Remote calls go through [`gateway::ChatGateway`]; the default
//! [`gateway::ProviderGateway`] talks to OpenAI and Anthropic and paces calls
//! under a fixed interval.

pub mod choice;
pub mod dataset;
pub mod experiment;
pub mod extract;
pub mod gateway;
pub mod prompts;
pub mod scoring;

pub use choice::Choice;
pub use dataset::{load_examples, load_questions, DatasetError, FewShotExample, Question, QuestionId};
pub use experiment::{
    ExperimentContext, ExperimentError, ExperimentSummary, GradedExperiment, ModelSpec,
    SelfConsistency,
};
pub use extract::extract_letter;
pub use gateway::{Attribution, ChatGateway, GatewayConfig, ProviderGateway, UsageSink};
pub use scoring::{majority_vote, score, Tally};
