//! Language models and the decoding loop built on top of them.
//!
//! This module provides:
//! - The `LanguageModel` trait every loaded model implements
//! - A word n-gram model (`MultiGramModel`) built from fixed-order tables
//! - Decoding parameters (`GenerationConfig`)
//! - The sampling decoder (`Generator`)

use crate::error::Result;

/// Autoregressive decoder and its sampling steps
/// (repetition penalty, temperature, top-k).
pub mod generator;

/// Validated decoding parameters with their defaults.
pub mod generation_config;

/// Multi-order word n-gram model with backoff.
///
/// Supports training from text (in parallel), merging, postcard
/// persistence and next-word prediction.
pub mod multigram_model;

/// Fixed-order word n-gram table (`n >= 2`).
pub mod ngram_model;

/// Transition counts of a single n-gram prefix.
///
/// This module is not exposed publicly.
mod state;

/// A model mapping a fixed-length context to a next-token distribution.
///
/// Implementations are loaded once and shared read-only between requests,
/// hence the `Send + Sync` bound.
pub trait LanguageModel: Send + Sync {
	/// Length of every vector returned by `predict` (padding slot included).
	fn vocab_size(&self) -> usize;

	/// Returns the probability of each vocabulary index being next.
	///
	/// `context` is left-padded with `PADDING_ID`.
	fn predict(&self, context: &[u32]) -> Result<Vec<f32>>;
}
