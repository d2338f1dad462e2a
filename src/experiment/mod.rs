//! Experiment drivers: few-shot, example order, role priming, self-consistency.
//!
//! Each driver walks model, then variant, then question, strictly in
//! sequence. Provider failures never abort a run; they show up as records
//! with no response and no answer.

mod persist;
mod record;
mod runner;
mod summary;
mod variant;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::dataset::{DatasetError, FewShotExample, Question};
use crate::gateway::{ChatGateway, ChatModel};

pub use record::{Graded, ResultRecord, RunSample, SelfConsistencyRecord};
pub use runner::{GradedExperiment, Partition, SelfConsistency};
pub use summary::{summarize_dir, ExperimentSummary, VariantSummary};
pub use variant::{ExampleOrder, PromptStyle, Variant, VariantTag};

pub const GPT_35_TURBO: &str = "gpt-3.5-turbo";
pub const CLAUDE_35_SONNET: &str = "claude-3-5-sonnet";

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error on {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

/// A model under test: the label written to results plus how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub label: String,
    pub route: ChatModel,
    pub max_tokens: Option<u32>,
}

impl ModelSpec {
    pub fn gpt_35_turbo() -> Self {
        Self {
            label: GPT_35_TURBO.into(),
            route: ChatModel::openai("gpt-3.5-turbo"),
            max_tokens: None,
        }
    }

    pub fn claude_35_sonnet() -> Self {
        Self {
            label: CLAUDE_35_SONNET.into(),
            route: ChatModel::anthropic("claude-3-5-sonnet-20241022"),
            max_tokens: Some(100),
        }
    }

    /// Both models, in the order experiments run them.
    pub fn defaults() -> Vec<Self> {
        vec![Self::gpt_35_turbo(), Self::claude_35_sonnet()]
    }

    /// Resolve a known label or an `openai:<id>` / `anthropic:<id>` route.
    pub fn parse(spec: &str) -> Result<Self, ExperimentError> {
        let spec = spec.trim();
        match spec {
            GPT_35_TURBO => return Ok(Self::gpt_35_turbo()),
            CLAUDE_35_SONNET => return Ok(Self::claude_35_sonnet()),
            _ => {}
        }

        let (provider, id) = spec.split_once(':').ok_or_else(|| {
            ExperimentError::InvalidPlan(format!(
                "unknown model '{spec}' (use {GPT_35_TURBO}, {CLAUDE_35_SONNET}, openai:<id> or anthropic:<id>)"
            ))
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ExperimentError::InvalidPlan(format!(
                "model '{spec}' has an empty id"
            )));
        }
        check_label(id)?;

        match provider.trim() {
            "openai" => Ok(Self {
                label: id.into(),
                route: ChatModel::openai(id),
                max_tokens: None,
            }),
            "anthropic" => Ok(Self {
                label: id.into(),
                route: ChatModel::anthropic(id),
                max_tokens: Some(crate::gateway::anthropic::DEFAULT_MAX_TOKENS),
            }),
            other => Err(ExperimentError::InvalidPlan(format!(
                "unknown provider '{other}' in model '{spec}'"
            ))),
        }
    }
}

/// Labels end up inside result file names.
fn check_label(label: &str) -> Result<(), ExperimentError> {
    if label.is_empty() || label.contains(['/', '\\']) {
        return Err(ExperimentError::InvalidPlan(format!(
            "model label '{label}' cannot be used in a file name"
        )));
    }
    Ok(())
}

/// Everything a driver needs besides its own configuration.
pub struct ExperimentContext<'a> {
    pub gateway: &'a dyn ChatGateway,
    pub questions: &'a [Question],
    pub examples: &'a [FewShotExample],
    pub run_id: Uuid,
    /// When set, each partition is saved here as soon as it completes.
    pub out_dir: Option<PathBuf>,
}

impl<'a> ExperimentContext<'a> {
    pub fn new(
        gateway: &'a dyn ChatGateway,
        questions: &'a [Question],
        examples: &'a [FewShotExample],
    ) -> Self {
        Self {
            gateway,
            questions,
            examples,
            run_id: Uuid::new_v4(),
            out_dir: None,
        }
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    fn check_models(&self, models: &[ModelSpec]) -> Result<(), ExperimentError> {
        if models.is_empty() {
            return Err(ExperimentError::InvalidPlan("no models given".into()));
        }
        for model in models {
            check_label(&model.label)?;
            if !self.gateway.supports(&model.route) {
                return Err(ExperimentError::InvalidPlan(format!(
                    "{} provider is not configured for model {}",
                    model.route.provider(),
                    model.label
                )));
            }
        }
        Ok(())
    }
}
