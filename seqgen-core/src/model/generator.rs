use std::collections::HashSet;

use rand::Rng;

use super::generation_config::GenerationConfig;
use super::LanguageModel;
use crate::error::{GenError, Result};
use crate::text::{postprocess, preprocess};
use crate::tokenizer::{Tokenizer, PADDING_ID};

/// Added to every probability before taking its logarithm.
pub const EPSILON: f32 = 1e-10;

/// Counters handed to the abort hook before every decoding step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
	/// Words appended so far.
	pub produced: usize,
	/// Steps whose sample was padding or an unknown index.
	pub discarded: usize,
}

/// Result of one generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
	/// Prompt plus generated words, postprocessed for display.
	pub text: String,
	/// Only the newly generated words.
	pub words: Vec<String>,
	pub discarded: usize,
	/// True when the abort hook stopped the loop early.
	pub aborted: bool,
}

/// Autoregressive decoder.
///
/// # Responsibilities
/// - Re-encode the whole running text at each step
/// - Query a `LanguageModel` for the next-word distribution
/// - Apply repetition penalty, temperature and top-k before sampling
/// - Skip samples that are padding or have no word, without consuming budget
#[derive(Clone, Debug)]
pub struct Generator {
	config: GenerationConfig,
}

impl Generator {
	/// Creates a generator after validating its configuration.
	pub fn new(config: GenerationConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config })
	}

	pub fn config(&self) -> &GenerationConfig {
		&self.config
	}

	/// Generates `max_new_tokens` words after `prompt`.
	///
	/// # Errors
	/// - [`GenError::TokenizerMissing`] if `tokenizer` is `None`
	/// - [`GenError::InvalidDistribution`] if the model output cannot be sampled
	/// - any error returned by the model itself
	pub fn generate<R: Rng>(
		&self,
		model: &dyn LanguageModel,
		tokenizer: Option<&Tokenizer>,
		prompt: &str,
		rng: &mut R,
	) -> Result<Generation> {
		self.generate_with_abort(model, tokenizer, prompt, rng, |_| false)
	}

	/// Same as [`Generator::generate`], but `abort` is consulted before every
	/// step and stops the loop when it returns `true`.
	///
	/// Discarded steps never end the loop by themselves; the abort hook is the
	/// only way to bound them.
	pub fn generate_with_abort<R, F>(
		&self,
		model: &dyn LanguageModel,
		tokenizer: Option<&Tokenizer>,
		prompt: &str,
		rng: &mut R,
		mut abort: F,
	) -> Result<Generation>
	where
		R: Rng,
		F: FnMut(&Progress) -> bool,
	{
		let tokenizer = tokenizer.ok_or(GenError::TokenizerMissing)?;
		let config = &self.config;

		let mut text_words: Vec<String> = prompt.split_whitespace().map(str::to_owned).collect();
		let mut generated: Vec<String> = Vec::with_capacity(config.max_new_tokens);
		let mut progress = Progress::default();
		let mut aborted = false;

		while progress.produced < config.max_new_tokens {
			if abort(&progress) {
				aborted = true;
				break;
			}

			// Full context is re-encoded every step
			let context = preprocess(&text_words.join(" "), Some(tokenizer), config.max_len)?;
			let mut probabilities = model.predict(&context)?;
			if probabilities.is_empty() || probabilities.len() != model.vocab_size() {
				return Err(GenError::InvalidDistribution(format!(
					"expected {} probabilities, got {}",
					model.vocab_size(),
					probabilities.len()
				)));
			}

			let window_start = generated.len().saturating_sub(config.history_window);
			apply_repetition_penalty(
				&mut probabilities,
				&generated[window_start..],
				tokenizer,
				config.repetition_penalty,
			);
			apply_temperature(&mut probabilities, config.temperature)?;
			let index = sample_top_k(&probabilities, config.top_k, rng)?;

			let index = index as u32;
			if index <= PADDING_ID {
				progress.discarded += 1;
				continue;
			}
			let Some(word) = tokenizer.word_of(index) else {
				log::trace!("sampled index {index} has no word, skipping");
				progress.discarded += 1;
				continue;
			};

			text_words.push(word.to_owned());
			generated.push(word.to_owned());
			progress.produced += 1;
		}

		log::debug!(
			"generated {} words ({} discarded{})",
			progress.produced,
			progress.discarded,
			if aborted { ", aborted" } else { "" }
		);

		Ok(Generation {
			text: postprocess(&text_words),
			words: generated,
			discarded: progress.discarded,
			aborted,
		})
	}
}

/// Divides the probability of every distinct word in `recent` by `penalty`.
///
/// Words unknown to the tokenizer map to the padding slot.
pub fn apply_repetition_penalty(probabilities: &mut [f32], recent: &[String], tokenizer: &Tokenizer, penalty: f32) {
	let distinct: HashSet<&str> = recent.iter().map(String::as_str).collect();
	for word in distinct {
		let index = tokenizer.encode_word(word) as usize;
		if let Some(p) = probabilities.get_mut(index) {
			*p /= penalty;
		}
	}
}

/// Rescales a distribution by `temperature` and renormalizes it.
///
/// Computes `exp(ln(p + EPSILON) / temperature)`; the maximum log value is
/// subtracted first, which leaves the normalized result unchanged.
///
/// # Errors
/// Returns [`GenError::InvalidDistribution`] on negative or non-finite input.
pub fn apply_temperature(probabilities: &mut [f32], temperature: f32) -> Result<()> {
	if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
		return Err(GenError::InvalidDistribution("negative or non-finite probability".to_owned()));
	}

	let mut max_logit = f32::NEG_INFINITY;
	for p in probabilities.iter_mut() {
		*p = (*p + EPSILON).ln() / temperature;
		max_logit = max_logit.max(*p);
	}

	let mut sum = 0.0;
	for p in probabilities.iter_mut() {
		*p = (*p - max_logit).exp();
		sum += *p;
	}
	for p in probabilities.iter_mut() {
		*p /= sum;
	}
	Ok(())
}

/// Returns the `k` indices with the highest probability, best first.
/// Ties go to the lower index.
pub fn top_k_indices(probabilities: &[f32], k: usize) -> Vec<usize> {
	let mut indices: Vec<usize> = (0..probabilities.len()).collect();
	indices.sort_by(|a, b| probabilities[*b].total_cmp(&probabilities[*a]).then(a.cmp(b)));
	indices.truncate(k);
	indices
}

/// Samples one index among the `k` most likely ones, proportionally to
/// their renormalized probabilities.
///
/// # Errors
/// Returns [`GenError::InvalidDistribution`] if the kept mass is zero.
pub fn sample_top_k<R: Rng>(probabilities: &[f32], k: usize, rng: &mut R) -> Result<usize> {
	let candidates = top_k_indices(probabilities, k);
	let total: f32 = candidates.iter().map(|i| probabilities[*i]).sum();
	if !(total > 0.0) || !total.is_finite() {
		return Err(GenError::InvalidDistribution("no probability mass left after top-k".to_owned()));
	}

	let mut r = rng.random::<f32>() * total;
	let mut fallback = None;
	for index in candidates {
		let p = probabilities[index];
		if r < p {
			return Ok(index);
		}
		r -= p;
		if p > 0.0 {
			fallback = Some(index);
		}
	}

	// Rounding left r marginally above the last bucket
	fallback.ok_or_else(|| GenError::InvalidDistribution("empty candidate set".to_owned()))
}
