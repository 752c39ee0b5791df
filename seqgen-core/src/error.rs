use thiserror::Error;

/// Errors produced by the generation pipeline.
///
/// Every stage (preprocessing, model query, sampling, artifact I/O) returns
/// `Result<_, GenError>`. Callers at the request boundary render the error
/// as a human-readable string; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum GenError {
	/// The tokenizer was never loaded.
	#[error("tokenizer is not loaded")]
	TokenizerMissing,

	/// No model artifact could be loaded.
	#[error("no model is loaded")]
	NoModels,

	/// The requested model name is not among the loaded models.
	#[error("model '{0}' not found")]
	ModelNotFound(String),

	/// A generation or training parameter is out of range.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The model returned a vector that cannot be sampled from.
	#[error("invalid distribution: {0}")]
	InvalidDistribution(String),

	/// Two models cannot be combined (order or vocabulary differ).
	#[error("model mismatch: {0}")]
	ModelMismatch(String),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("model codec error: {0}")]
	Codec(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
