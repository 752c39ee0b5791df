use std::path::PathBuf;

use clap::Parser;

use seqgen_core::model::generation_config::{
	DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_LEN, DEFAULT_MAX_NEW_TOKENS, DEFAULT_REPETITION_PENALTY, DEFAULT_TEMPERATURE,
	DEFAULT_TOP_K,
};
use seqgen_core::GenerationConfig;

/// Command line (and environment) configuration of the server.
#[derive(Parser, Debug, Clone)]
#[command(name = "seqgen-server", version, about = "Serve text generation from trained artifacts")]
pub struct ServerArgs {
	/// Address to bind
	#[arg(long, env = "SEQGEN_HOST", default_value = "127.0.0.1")]
	pub host: String,

	#[arg(long, env = "SEQGEN_PORT", default_value_t = 5000)]
	pub port: u16,

	/// Directory scanned for model artifacts
	#[arg(long, env = "SEQGEN_MODEL_DIR", default_value = "model/trained_model")]
	pub model_dir: PathBuf,

	/// Tokenizer JSON file
	#[arg(long, env = "SEQGEN_TOKENIZER", default_value = "model/tokenizer/tokenizer.json")]
	pub tokenizer: PathBuf,

	/// Length of the encoded context given to the model
	#[arg(long, default_value_t = DEFAULT_MAX_LEN)]
	pub max_len: usize,

	/// Words generated per request
	#[arg(long, default_value_t = DEFAULT_MAX_NEW_TOKENS)]
	pub max_new_tokens: usize,

	#[arg(long, default_value_t = DEFAULT_TOP_K)]
	pub top_k: usize,

	#[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
	pub temperature: f32,

	#[arg(long, default_value_t = DEFAULT_REPETITION_PENALTY)]
	pub repetition_penalty: f32,

	/// Recent generated words considered by the repetition penalty
	#[arg(long, default_value_t = DEFAULT_HISTORY_WINDOW)]
	pub history_window: usize,

	/// Seed every request's RNG with this value (reproducible output)
	#[arg(long, env = "SEQGEN_SEED")]
	pub seed: Option<u64>,

	/// Abort a request after this many discarded sampling steps
	#[arg(long, default_value_t = 1000)]
	pub discard_limit: usize,
}

impl ServerArgs {
	/// Decoding parameters taken from the flags (not yet validated).
	pub fn generation_config(&self) -> GenerationConfig {
		GenerationConfig {
			max_new_tokens: self.max_new_tokens,
			top_k: self.top_k,
			temperature: self.temperature,
			repetition_penalty: self.repetition_penalty,
			history_window: self.history_window,
			max_len: self.max_len,
		}
	}
}
