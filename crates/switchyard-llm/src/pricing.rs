//! Per-model price and context tables used by the metered backend.
//!
//! Prices are approximations in USD per 1K tokens. Cost estimates assume a fixed
//! 75% input / 25% output split of the reported token count; the split is not
//! configurable.

use serde::{Deserialize, Serialize};

/// Share of reported tokens billed at the input rate
pub const INPUT_SHARE: f64 = 0.75;
/// Share of reported tokens billed at the output rate
pub const OUTPUT_SHARE: f64 = 0.25;

/// Context ceiling assumed for models missing from [`default_max_tokens`]
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Price of one model, per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Estimated cost of `tokens`, rounded to six decimals
    pub fn estimate(&self, tokens: u64) -> f64 {
        let tokens = tokens as f64;
        let input = tokens * INPUT_SHARE / 1000.0 * self.input_per_1k;
        let output = tokens * OUTPUT_SHARE / 1000.0 * self.output_per_1k;
        round6(input + output).max(0.0)
    }
}

/// Entry used for models missing from the table
pub const DEFAULT_PRICE: ModelPrice = ModelPrice::new(0.003, 0.015);

/// Look up the price of `model`, falling back to [`DEFAULT_PRICE`]
pub fn price_for(model: &str) -> ModelPrice {
    match model {
        "gpt-4o" => ModelPrice::new(0.0025, 0.01),
        "gpt-4o-mini" => ModelPrice::new(0.00015, 0.0006),
        "gpt-4-turbo" => ModelPrice::new(0.01, 0.03),
        "o3-mini" => ModelPrice::new(0.0011, 0.0044),
        "claude-3-5-sonnet-20241022" | "claude-3-5-sonnet" => ModelPrice::new(0.003, 0.015),
        "claude-3-opus-20240229" | "claude-3-opus" => ModelPrice::new(0.015, 0.075),
        "claude-3-haiku-20240307" | "claude-3-haiku" => ModelPrice::new(0.00025, 0.00125),
        "deepseek-chat" => ModelPrice::new(0.00027, 0.0011),
        "mistral-large-latest" => ModelPrice::new(0.002, 0.006),
        _ => DEFAULT_PRICE,
    }
}

/// Context ceiling for well-known models
pub fn default_max_tokens(model: &str) -> u32 {
    match model {
        "gpt-4o" | "gpt-4o-mini" | "gpt-4-turbo" => 128_000,
        "o3-mini" => 200_000,
        m if m.starts_with("claude-3") => 200_000,
        "deepseek-chat" => 64_000,
        "mistral-large-latest" => 128_000,
        m if m.starts_with("llama3.1") || m.starts_with("llama3.2") => 128_000,
        m if m.starts_with("llama3") => 8192,
        m if m.starts_with("qwen2.5") => 32_768,
        m if m.starts_with("codellama") => 16_384,
        m if m.starts_with("mistral") => 32_768,
        m if m.starts_with("deepseek-coder") => 16_384,
        _ => DEFAULT_MAX_TOKENS,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_uses_fixed_split() {
        let price = ModelPrice::new(0.003, 0.015);
        // 750 input tokens at 0.003/1K + 250 output tokens at 0.015/1K
        assert_eq!(price.estimate(1000), 0.006);
        assert_eq!(price.estimate(0), 0.0);
    }

    #[test]
    fn test_estimate_rounds_to_six_decimals() {
        let price = ModelPrice::new(0.00015, 0.0006);
        let cost = price.estimate(7);
        assert_eq!(cost, 0.000002);
    }

    #[test]
    fn test_unknown_model_uses_default_price() {
        assert_eq!(price_for("some-new-model"), DEFAULT_PRICE);
        assert_eq!(price_for("gpt-4o-mini"), ModelPrice::new(0.00015, 0.0006));
    }

    #[test]
    fn test_max_tokens_table() {
        assert_eq!(default_max_tokens("gpt-4o"), 128_000);
        assert_eq!(default_max_tokens("claude-3-haiku"), 200_000);
        assert_eq!(default_max_tokens("llama3.1:8b"), 128_000);
        assert_eq!(default_max_tokens("qwen2.5-coder-7b-instruct"), 32_768);
        assert_eq!(default_max_tokens("unknown"), DEFAULT_MAX_TOKENS);
    }
}
