use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};

pub const DEFAULT_MAX_NEW_TOKENS: usize = 60;
pub const DEFAULT_TOP_K: usize = 50;
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_REPETITION_PENALTY: f32 = 1.2;
pub const DEFAULT_HISTORY_WINDOW: usize = 25;
pub const DEFAULT_MAX_LEN: usize = 80;

/// Parameters of the decoding loop.
///
/// # Fields
/// - `max_new_tokens`: number of words to append (discarded steps excluded)
/// - `top_k`: how many of the most likely indices are kept for sampling
/// - `temperature`: divides log-probabilities; below 1 sharpens, above 1 flattens
/// - `repetition_penalty`: divisor applied to recently generated words (1.0 disables)
/// - `history_window`: how many recent generated words the penalty looks at
/// - `max_len`: length of the encoded context given to the model
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
	pub max_new_tokens: usize,
	pub top_k: usize,
	pub temperature: f32,
	pub repetition_penalty: f32,
	pub history_window: usize,
	pub max_len: usize,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self {
			max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
			top_k: DEFAULT_TOP_K,
			temperature: DEFAULT_TEMPERATURE,
			repetition_penalty: DEFAULT_REPETITION_PENALTY,
			history_window: DEFAULT_HISTORY_WINDOW,
			max_len: DEFAULT_MAX_LEN,
		}
	}
}

impl GenerationConfig {
	/// Checks that every parameter is in range.
	///
	/// # Errors
	/// Returns [`GenError::InvalidConfig`] naming the first offending field.
	pub fn validate(&self) -> Result<()> {
		if self.max_len == 0 {
			return Err(GenError::InvalidConfig("max_len must be > 0".to_owned()));
		}
		if self.top_k == 0 {
			return Err(GenError::InvalidConfig("top_k must be > 0".to_owned()));
		}
		if !self.temperature.is_finite() || self.temperature <= 0.0 {
			return Err(GenError::InvalidConfig(format!(
				"temperature must be a positive number, got {}",
				self.temperature
			)));
		}
		if !self.repetition_penalty.is_finite() || self.repetition_penalty < 1.0 {
			return Err(GenError::InvalidConfig(format!(
				"repetition_penalty must be >= 1.0, got {}",
				self.repetition_penalty
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = GenerationConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.max_new_tokens, 60);
		assert_eq!(config.top_k, 50);
		assert_eq!(config.history_window, 25);
	}

	#[test]
	fn rejects_out_of_range_values() {
		let bad = [
			GenerationConfig { max_len: 0, ..Default::default() },
			GenerationConfig { top_k: 0, ..Default::default() },
			GenerationConfig { temperature: 0.0, ..Default::default() },
			GenerationConfig { temperature: f32::NAN, ..Default::default() },
			GenerationConfig { repetition_penalty: 0.5, ..Default::default() },
		];
		for config in bad {
			assert!(matches!(config.validate(), Err(GenError::InvalidConfig(_))), "{config:?}");
		}
	}

	#[test]
	fn missing_fields_use_defaults() {
		let config: GenerationConfig = serde_json::from_str(r#"{"top_k": 5}"#).unwrap();
		assert_eq!(config.top_k, 5);
		assert_eq!(config.max_new_tokens, DEFAULT_MAX_NEW_TOKENS);
	}
}
