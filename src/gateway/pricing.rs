//! Model pricing registry.
//!
//! Costs are in nanodollars (1e-9 USD) per token, keyed by provider model id.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Pricing information for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    /// Provider name.
    pub provider: &'static str,
    /// Cost per input token in nanodollars.
    pub input_nanos_per_token: i64,
    /// Cost per output token in nanodollars.
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(provider: &'static str, input: i64, output: i64) -> Self {
        Self {
            provider,
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    /// Calculate cost for a request.
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        (input_tokens as i64) * self.input_nanos_per_token
            + (output_tokens as i64) * self.output_nanos_per_token
    }
}

// =============================================================================
// PRICING DATA
// =============================================================================

// GPT-3.5 Turbo: $0.50/1M input, $1.50/1M output
// GPT-4o-mini: $0.15/1M input, $0.60/1M output
const GPT_35_TURBO: ModelPricing = ModelPricing::new("openai", 500, 1_500);
const GPT_4O_MINI: ModelPricing = ModelPricing::new("openai", 150, 600);

// Claude 3.5 Sonnet: $3.00/1M input, $15.00/1M output
// Claude 3.5 Haiku: $0.80/1M input, $4.00/1M output
const CLAUDE_35_SONNET: ModelPricing = ModelPricing::new("anthropic", 3_000, 15_000);
const CLAUDE_35_HAIKU: ModelPricing = ModelPricing::new("anthropic", 800, 4_000);

static PRICING_MAP: OnceLock<HashMap<&'static str, ModelPricing>> = OnceLock::new();

fn init_pricing() -> HashMap<&'static str, ModelPricing> {
    let mut map = HashMap::new();

    map.insert("gpt-3.5-turbo", GPT_35_TURBO);
    map.insert("gpt-3.5-turbo-0125", GPT_35_TURBO);
    map.insert("gpt-4o-mini", GPT_4O_MINI);

    map.insert("claude-3-5-sonnet-20241022", CLAUDE_35_SONNET);
    map.insert("claude-3-5-sonnet-latest", CLAUDE_35_SONNET);
    map.insert("claude-3-5-haiku-20241022", CLAUDE_35_HAIKU);

    map
}

/// Get pricing for a model.
pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    let map = PRICING_MAP.get_or_init(init_pricing);
    map.get(model_id).copied()
}

/// Calculate chat cost. Unknown models are not priced.
pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    get_pricing(model)
        .map(|p| p.calculate_cost(input_tokens, output_tokens))
        .unwrap_or(0)
}
