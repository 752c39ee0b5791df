//! Prompt preprocessing and output postprocessing.

use crate::error::{GenError, Result};
use crate::tokenizer::{Tokenizer, PADDING_ID};

/// Normalizes raw text before tokenization.
///
/// - lowercases
/// - drops every character that is neither a word character
///   (alphanumeric or `_`) nor whitespace
/// - collapses whitespace runs into a single space and trims
pub fn normalize(text: &str) -> String {
	let kept: String = text
		.to_lowercase()
		.chars()
		.filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
		.collect();
	kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Left-pads with [`PADDING_ID`] or left-truncates to exactly `max_len`
/// positions. Truncation keeps the most recent tokens.
pub fn pad_sequence(sequence: &[u32], max_len: usize) -> Vec<u32> {
	if sequence.len() >= max_len {
		return sequence[sequence.len() - max_len..].to_vec();
	}
	let mut padded = vec![PADDING_ID; max_len - sequence.len()];
	padded.extend_from_slice(sequence);
	padded
}

/// Converts a prompt into the fixed-length sequence fed to a model.
///
/// # Errors
/// Returns [`GenError::TokenizerMissing`] if no tokenizer is loaded.
pub fn preprocess(text: &str, tokenizer: Option<&Tokenizer>, max_len: usize) -> Result<Vec<u32>> {
	let tokenizer = tokenizer.ok_or(GenError::TokenizerMissing)?;
	let encoded: Vec<u32> = normalize(text)
		.split(' ')
		.filter(|word| !word.is_empty())
		.map(|word| tokenizer.encode_word(word))
		.collect();
	Ok(pad_sequence(&encoded, max_len))
}

/// Joins words into display text, gluing a space-separated period back onto
/// the previous word (`"hola ."` → `"hola."`).
pub fn postprocess<S: AsRef<str>>(words: &[S]) -> String {
	words
		.iter()
		.map(AsRef::as_ref)
		.collect::<Vec<_>>()
		.join(" ")
		.replace(" .", ".")
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn spanish() -> Tokenizer {
		Tokenizer::new(HashMap::from([
			("hola".to_owned(), 3),
			("como".to_owned(), 4),
			("estas".to_owned(), 5),
		]))
	}

	#[test]
	fn normalize_strips_punctuation_and_whitespace() {
		assert_eq!(normalize("  ¡Hola,   CÓMO\testás?! "), "hola cómo estás");
		assert_eq!(normalize("snake_case stays"), "snake_case stays");
		assert_eq!(normalize("..."), "");
	}

	#[test]
	fn preprocess_pads_on_the_left() {
		let sequence = preprocess("hola como estas", Some(&spanish()), 80).unwrap();
		assert_eq!(sequence.len(), 80);
		assert!(sequence[..77].iter().all(|&id| id == 0));
		assert_eq!(&sequence[77..], &[3, 4, 5]);
	}

	#[test]
	fn preprocess_truncates_keeping_recent_words() {
		let sequence = preprocess("hola como estas hola", Some(&spanish()), 2).unwrap();
		assert_eq!(sequence, vec![5, 3]);
	}

	#[test]
	fn preprocess_maps_unknown_words_to_padding() {
		let sequence = preprocess("Hola amigo", Some(&spanish()), 3).unwrap();
		assert_eq!(sequence, vec![0, 3, 0]);
	}

	#[test]
	fn preprocess_has_fixed_length_for_any_prompt() {
		let tokenizer = spanish();
		for prompt in ["", "hola", "   ", "hola como estas como estas hola como", "?!"] {
			assert_eq!(preprocess(prompt, Some(&tokenizer), 5).unwrap().len(), 5);
		}
	}

	#[test]
	fn preprocess_without_tokenizer_fails() {
		let err = preprocess("hola", None, 80).unwrap_err();
		assert!(matches!(err, GenError::TokenizerMissing));
	}

	#[test]
	fn postprocess_glues_period() {
		assert_eq!(postprocess(&["hola", "."]), "hola.");
		assert_eq!(postprocess(&["hola", "mundo", ".", "adios"]), "hola mundo. adios");
		assert_eq!(postprocess::<&str>(&[]), "");
	}
}
