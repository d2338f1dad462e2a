//! Sequential experiment drivers over one shared extract/score core.

use crate::dataset::Question;
use crate::extract::extract_letter;
use crate::gateway::{Attribution, ChatRequest};
use crate::prompts::{self, PromptInstance, DEFAULT_ROLE};
use crate::scoring::{majority_vote, score};

use super::persist::save_partition;
use super::record::{ResultRecord, RunSample, SelfConsistencyRecord};
use super::variant::{ExampleOrder, PromptStyle, Variant};
use super::{ExperimentContext, ExperimentError, ModelSpec};

/// All records for one (model, variant), destined for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<R> {
    pub file_name: String,
    pub llm: String,
    pub variant: String,
    pub records: Vec<R>,
}

/// Save a finished partition right away when the context has an output dir.
fn keep<R: serde::Serialize>(
    ctx: &ExperimentContext<'_>,
    partitions: &mut Vec<Partition<R>>,
    partition: Partition<R>,
) -> Result<(), ExperimentError> {
    if let Some(dir) = ctx.out_dir() {
        save_partition(dir, &partition)?;
    }
    partitions.push(partition);
    Ok(())
}

/// Send one prompt; a failed call is logged and becomes `None`.
async fn ask(
    ctx: &ExperimentContext<'_>,
    model: &ModelSpec,
    prompt: &PromptInstance,
    temperature: f32,
    caller: &'static str,
) -> Option<String> {
    let mut req = ChatRequest::new(
        model.route.clone(),
        prompt.to_messages(),
        Attribution::new(caller).with_run(ctx.run_id),
    )
    .temperature(temperature);
    if let Some(max) = model.max_tokens {
        req = req.max_tokens(max);
    }

    match ctx.gateway.chat(req).await {
        Ok(resp) => Some(resp.content.trim().to_string()),
        Err(err) => {
            tracing::warn!(
                model = %model.label,
                template = prompt.template_slug,
                error = %err,
                "provider call failed; recording no response"
            );
            None
        }
    }
}

fn verdict(is_correct: bool) -> &'static str {
    if is_correct {
        "correct"
    } else {
        "wrong"
    }
}

fn letter_or_unknown(answer: Option<crate::choice::Choice>) -> String {
    answer.map_or_else(|| "?".to_string(), |c| c.to_string())
}

// =============================================================================
// Graded experiments (few-shot, order effect, role priming)
// =============================================================================

/// One answer per (model, variant, question), graded against the key.
#[derive(Debug, Clone)]
pub struct GradedExperiment {
    pub name: &'static str,
    pub models: Vec<ModelSpec>,
    pub variants: Vec<Variant>,
    pub temperature: f32,
    /// Persona text for [`PromptStyle::Role`].
    pub role: String,
}

impl GradedExperiment {
    pub fn few_shot(models: Vec<ModelSpec>, shots: &[usize]) -> Self {
        Self {
            name: "few-shot",
            models,
            variants: shots.iter().copied().map(Variant::Shots).collect(),
            temperature: 0.0,
            role: DEFAULT_ROLE.into(),
        }
    }

    pub fn order_effect(models: Vec<ModelSpec>, orders: Vec<ExampleOrder>) -> Self {
        Self {
            name: "order-effect",
            models,
            variants: orders.into_iter().map(Variant::Order).collect(),
            temperature: 0.0,
            role: DEFAULT_ROLE.into(),
        }
    }

    pub fn role_priming(models: Vec<ModelSpec>, role: impl Into<String>) -> Self {
        Self {
            name: "role",
            models,
            variants: vec![
                Variant::Style(PromptStyle::Standard),
                Variant::Style(PromptStyle::Role),
            ],
            temperature: 0.0,
            role: role.into(),
        }
    }

    /// Whether any variant draws from the example pool.
    pub fn needs_examples(&self) -> bool {
        self.variants.iter().any(|v| match v {
            Variant::Shots(n) => *n > 0,
            Variant::Order(_) => true,
            Variant::Style(_) => false,
        })
    }

    /// Reject plans that cannot run, before any remote call.
    pub fn validate(&self, ctx: &ExperimentContext<'_>) -> Result<(), ExperimentError> {
        ctx.check_models(&self.models)?;
        if self.variants.is_empty() {
            return Err(ExperimentError::InvalidPlan(format!(
                "{} has no variants",
                self.name
            )));
        }
        for variant in &self.variants {
            variant.validate(ctx.examples)?;
        }
        if self.role.trim().is_empty()
            && self.variants.contains(&Variant::Style(PromptStyle::Role))
        {
            return Err(ExperimentError::InvalidPlan("role text is empty".into()));
        }
        Ok(())
    }

    pub async fn run(
        &self,
        ctx: &ExperimentContext<'_>,
    ) -> Result<Vec<Partition<ResultRecord>>, ExperimentError> {
        self.validate(ctx)?;
        eprintln!(
            "[{}] {} models x {} variants x {} questions",
            self.name,
            self.models.len(),
            self.variants.len(),
            ctx.questions.len()
        );

        let mut partitions = Vec::with_capacity(self.models.len() * self.variants.len());
        for model in &self.models {
            for variant in &self.variants {
                let mut records = Vec::with_capacity(ctx.questions.len());
                for q in ctx.questions {
                    let record = self.grade(ctx, model, variant, q).await;
                    records.push(record);
                }
                let partition = Partition {
                    file_name: variant.file_name(&model.label),
                    llm: model.label.clone(),
                    variant: variant.tag().to_string(),
                    records,
                };
                keep(ctx, &mut partitions, partition)?;
            }
        }
        Ok(partitions)
    }

    async fn grade(
        &self,
        ctx: &ExperimentContext<'_>,
        model: &ModelSpec,
        variant: &Variant,
        q: &Question,
    ) -> ResultRecord {
        let prompt = variant.prompt(q, ctx.examples, &self.role);
        let response = ask(ctx, model, &prompt, self.temperature, self.name).await;
        let normalized = extract_letter(response.as_deref());
        let is_correct = score(normalized, q.answer);

        eprintln!(
            "[{}] Q{} | {} | {} | ans: {} | {}",
            self.name,
            q.id,
            variant.label(),
            model.label,
            letter_or_unknown(normalized),
            verdict(is_correct)
        );

        ResultRecord {
            id: q.id.clone(),
            llm: model.label.clone(),
            variant: variant.tag(),
            response,
            normalized_answer: normalized,
            correct_answer: q.answer,
            is_correct,
        }
    }
}

// =============================================================================
// Self-consistency
// =============================================================================

/// Sample each question `runs` times and keep the majority answer.
#[derive(Debug, Clone)]
pub struct SelfConsistency {
    pub models: Vec<ModelSpec>,
    pub runs: usize,
    pub temperature: f32,
}

impl SelfConsistency {
    pub const NAME: &'static str = "self-consistency";

    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self {
            models,
            runs: 3,
            temperature: 0.7,
        }
    }

    pub fn validate(&self, ctx: &ExperimentContext<'_>) -> Result<(), ExperimentError> {
        ctx.check_models(&self.models)?;
        if self.runs == 0 {
            return Err(ExperimentError::InvalidPlan(
                "self-consistency needs at least one run".into(),
            ));
        }
        Ok(())
    }

    pub async fn run(
        &self,
        ctx: &ExperimentContext<'_>,
    ) -> Result<Vec<Partition<SelfConsistencyRecord>>, ExperimentError> {
        self.validate(ctx)?;

        let mut partitions = Vec::with_capacity(self.models.len());
        for model in &self.models {
            eprintln!(
                "[{}] {} | {} runs per question, temperature {}",
                Self::NAME,
                model.label,
                self.runs,
                self.temperature
            );

            let mut records = Vec::with_capacity(ctx.questions.len());
            for q in ctx.questions {
                records.push(self.vote(ctx, model, q).await);
            }
            let partition = Partition {
                file_name: format!("results_{}_selfconsistency.json", model.label),
                llm: model.label.clone(),
                variant: "selfconsistency".into(),
                records,
            };
            keep(ctx, &mut partitions, partition)?;
        }
        Ok(partitions)
    }

    async fn vote(
        &self,
        ctx: &ExperimentContext<'_>,
        model: &ModelSpec,
        q: &Question,
    ) -> SelfConsistencyRecord {
        let prompt = prompts::self_consistency(q);

        let mut samples = Vec::with_capacity(self.runs);
        for _ in 0..self.runs {
            let raw_response = ask(ctx, model, &prompt, self.temperature, Self::NAME).await;
            let normalized = extract_letter(raw_response.as_deref());
            samples.push(RunSample {
                raw_response,
                normalized,
            });
        }

        let voted = majority_vote(samples.iter().map(|s| s.normalized));
        let is_correct = score(voted, q.answer);

        let votes: Vec<String> = samples
            .iter()
            .map(|s| letter_or_unknown(s.normalized))
            .collect();
        eprintln!(
            "[{}] Q{} | {} | votes: {} | voted: {} | {}",
            Self::NAME,
            q.id,
            model.label,
            votes.join(","),
            letter_or_unknown(voted),
            verdict(is_correct)
        );

        SelfConsistencyRecord {
            id: q.id.clone(),
            llm: model.label.clone(),
            true_answer: q.answer,
            voted_answer: voted,
            is_correct,
            runs: samples,
        }
    }
}
