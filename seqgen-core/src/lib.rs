//! Prompt-to-text generation library.
//!
//! This crate provides everything behind the generation front-end:
//! - A word tokenizer with a reserved padding index
//! - Prompt normalization and fixed-length encoding
//! - Word n-gram language models and their training
//! - A sampling decoder (repetition penalty, temperature, top-k)
//! - Startup artifact discovery, shared read-only between requests

/// Startup loading of models and tokenizer into an immutable context.
pub mod artifacts;

/// Error type shared by every pipeline stage.
pub mod error;

/// File helpers (listing, reading corpora, output paths).
pub mod io;

/// Language models and the decoding loop.
pub mod model;

/// Preprocessing and postprocessing of text.
pub mod text;

/// Word vocabulary and its JSON persistence.
pub mod tokenizer;

pub use artifacts::Artifacts;
pub use error::GenError;
pub use model::generation_config::GenerationConfig;
pub use model::generator::{Generation, Generator};
pub use model::LanguageModel;
pub use tokenizer::Tokenizer;
