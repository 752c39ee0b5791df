use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};

use super::ngram_model::NGramModel;
use super::LanguageModel;
use crate::error::{GenError, Result};
use crate::text::normalize;
use crate::tokenizer::{Tokenizer, PADDING_ID};

/// Share of probability mass always given to the unigram distribution
/// when a higher-order context matched.
pub const BACKOFF_FLOOR: f32 = 0.05;

/// Word-level language model combining n-gram tables of several orders.
///
/// This struct manages:
/// - `unigrams`: occurrence count of every vocabulary index
/// - `ngrams`: a map from order to its corresponding `NGramModel`
/// - `vocab_size`: length of every distribution returned by `predict`
///
/// Prediction uses the longest context suffix that has been observed and
/// backs off to shorter ones, down to plain unigram frequencies.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MultiGramModel {
	vocab_size: usize,
	max_order: usize,
	unigrams: Vec<usize>,
	ngrams: BTreeMap<usize, NGramModel>,
}

impl MultiGramModel {
	/// Creates an empty model.
	///
	/// # Errors
	/// Returns [`GenError::InvalidConfig`] if `vocab_size < 2` (padding plus
	/// at least one word) or `max_order < 2`.
	pub fn new(vocab_size: usize, max_order: usize) -> Result<Self> {
		if vocab_size < 2 {
			return Err(GenError::InvalidConfig("vocabulary must hold at least one word".to_owned()));
		}
		if max_order < 2 {
			return Err(GenError::InvalidConfig(format!("model order must be >= 2, got {max_order}")));
		}

		let mut ngrams = BTreeMap::new();
		for n in 2..=max_order {
			let table = NGramModel::new(n).map_err(GenError::InvalidConfig)?;
			ngrams.insert(n, table);
		}

		Ok(Self { vocab_size, max_order, unigrams: vec![0; vocab_size], ngrams })
	}

	/// Loads a model serialized with `postcard`.
	///
	/// # Errors
	/// Returns [`GenError::InvalidConfig`] if the decoded model breaks the
	/// shape `new` guarantees (vocabulary, order or n-gram table keys).
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		let model: Self = postcard::from_bytes(&bytes)?;
		model.check_shape()?;
		Ok(model)
	}

	fn check_shape(&self) -> Result<()> {
		if self.vocab_size < 2 || self.unigrams.len() != self.vocab_size {
			return Err(GenError::InvalidConfig(format!(
				"inconsistent model header: vocabulary {} with {} unigram counts",
				self.vocab_size,
				self.unigrams.len()
			)));
		}
		if self.max_order < 2 {
			return Err(GenError::InvalidConfig(format!("model order must be >= 2, got {}", self.max_order)));
		}
		for (n, table) in &self.ngrams {
			if !(2..=self.max_order).contains(n) || table.order() != *n {
				return Err(GenError::InvalidConfig(format!(
					"n-gram table {n} (order {}) does not fit a {}-gram model",
					table.order(),
					self.max_order
				)));
			}
		}
		Ok(())
	}

	/// Serializes the model with `postcard`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	pub fn max_order(&self) -> usize {
		self.max_order
	}

	/// Splits lines into chunks, builds partial models in parallel and
	/// merges them into a single model.
	///
	/// # Behavior
	/// - Splits input lines into chunks (CPU cores * factor).
	/// - Spawns scoped threads that build one partial model per chunk.
	/// - Collects partial models over an MPSC channel and merges them.
	pub fn train<S: AsRef<str> + Sync>(lines: &[S], tokenizer: &Tokenizer, max_order: usize) -> Result<Self> {
		let mut final_model = Self::new(tokenizer.vocab_size(), max_order)?;
		if lines.is_empty() {
			return Ok(final_model);
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = lines.len().div_ceil(chunks).max(1);

		let partial_models = lines
			.chunks(chunk_size)
			.map(|chunk| Self::new(final_model.vocab_size, max_order).map(|model| (chunk, model)))
			.collect::<Result<Vec<_>>>()?;

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (chunk, mut partial_model) in partial_models {
				let tx = tx.clone();
				scope.spawn(move || {
					for sentence in chunk {
						partial_model.add_sentence(sentence.as_ref(), tokenizer);
					}
					if tx.send(partial_model).is_err() {
						log::warn!("partial model dropped, receiver closed");
					}
				});
			}
		});
		drop(tx);

		for partial_model in rx.iter() {
			final_model.merge(&partial_model)?;
		}

		log::debug!(
			"trained {}-gram model on {} lines ({} contexts)",
			max_order,
			lines.len(),
			final_model.ngrams.values().map(NGramModel::len).sum::<usize>()
		);
		Ok(final_model)
	}

	/// Normalizes and encodes a sentence, then adds it.
	pub fn add_sentence(&mut self, sentence: &str, tokenizer: &Tokenizer) {
		let tokens: Vec<u32> = normalize(sentence)
			.split(' ')
			.filter(|word| !word.is_empty())
			.map(|word| tokenizer.encode_word(word))
			.collect();
		self.add_sequence(&tokens);
	}

	/// Adds an encoded sentence.
	///
	/// Unknown words (padding) split the sentence: no n-gram spans them.
	/// Tokens outside the vocabulary are ignored.
	pub fn add_sequence(&mut self, tokens: &[u32]) {
		let vocab_size = self.vocab_size;
		for run in tokens
			.split(|token| *token == PADDING_ID || *token as usize >= vocab_size)
			.filter(|run| !run.is_empty())
		{
			for token in run {
				self.unigrams[*token as usize] += 1;
			}
			for table in self.ngrams.values_mut() {
				table.add_sequence(run);
			}
		}
	}

	/// Merges another model into this one.
	///
	/// # Errors
	/// Returns [`GenError::ModelMismatch`] if orders or vocabularies differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.vocab_size != other.vocab_size || self.max_order != other.max_order {
			return Err(GenError::ModelMismatch(format!(
				"self=(vocab {}, order {}), other=(vocab {}, order {})",
				self.vocab_size, self.max_order, other.vocab_size, other.max_order
			)));
		}

		for (count, other_count) in self.unigrams.iter_mut().zip(&other.unigrams) {
			*count += other_count;
		}
		for (n, table) in &other.ngrams {
			if let Some(existing) = self.ngrams.get_mut(n) {
				existing.merge(table).map_err(GenError::ModelMismatch)?;
			} else {
				self.ngrams.insert(*n, table.clone());
			}
		}

		Ok(())
	}

	/// Adds the unigram distribution scaled by `weight`.
	/// Falls back to uniform over every word when nothing was observed.
	fn accumulate_unigrams(&self, distribution: &mut [f32], weight: f32) {
		let total: usize = self.unigrams.iter().sum();
		if total == 0 {
			let uniform = weight / (self.vocab_size - 1) as f32;
			for slot in distribution.iter_mut().skip(1) {
				*slot += uniform;
			}
			return;
		}
		for (slot, count) in distribution.iter_mut().zip(&self.unigrams) {
			*slot += weight * (*count as f32 / total as f32);
		}
	}
}

impl LanguageModel for MultiGramModel {
	fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	fn predict(&self, context: &[u32]) -> Result<Vec<f32>> {
		let context: Vec<u32> = context.iter().copied().filter(|token| *token != PADDING_ID).collect();
		let mut distribution = vec![0.0_f32; self.vocab_size];

		// Longest observed suffix wins
		let matched = self
			.ngrams
			.values()
			.rev()
			.find_map(|table| table.state_for(&context).filter(|state| state.total() > 0));

		match matched {
			Some(state) => {
				state.accumulate(&mut distribution, 1.0 - BACKOFF_FLOOR);
				self.accumulate_unigrams(&mut distribution, BACKOFF_FLOOR);
			}
			None => self.accumulate_unigrams(&mut distribution, 1.0),
		}

		distribution[PADDING_ID as usize] = 0.0;
		let sum: f32 = distribution.iter().sum();
		if !(sum > 0.0) {
			return Err(GenError::InvalidDistribution("model produced no probability mass".to_owned()));
		}
		for p in &mut distribution {
			*p /= sum;
		}
		Ok(distribution)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn tokenizer() -> Tokenizer {
		Tokenizer::new(HashMap::from([
			("el".to_owned(), 1),
			("gato".to_owned(), 2),
			("come".to_owned(), 3),
			("pescado".to_owned(), 4),
			("duerme".to_owned(), 5),
		]))
	}

	fn assert_normalized(distribution: &[f32]) {
		let sum: f32 = distribution.iter().sum();
		assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
		assert_eq!(distribution[0], 0.0);
	}

	#[test]
	fn rejects_degenerate_shapes() {
		assert!(MultiGramModel::new(1, 3).is_err());
		assert!(MultiGramModel::new(10, 1).is_err());
	}

	#[test]
	fn untrained_model_is_uniform_over_words() {
		let model = MultiGramModel::new(5, 2).unwrap();
		let distribution = model.predict(&[0, 0, 1]).unwrap();
		assert_normalized(&distribution);
		assert!(distribution[1..].iter().all(|p| (p - 0.25).abs() < 1e-6));
	}

	#[test]
	fn favors_observed_successor() {
		let lines = ["el gato come pescado", "el gato come pescado", "el gato duerme"];
		let model = MultiGramModel::train(&lines, &tokenizer(), 3).unwrap();

		let distribution = model.predict(&[0, 0, 1, 2]).unwrap();
		assert_normalized(&distribution);
		let best = (1..distribution.len())
			.max_by(|a, b| distribution[*a].total_cmp(&distribution[*b]))
			.unwrap();
		assert_eq!(best, 3);
		assert!(distribution[5] > distribution[4]);
	}

	#[test]
	fn unseen_context_backs_off_to_unigrams() {
		let lines = ["el gato come pescado"];
		let model = MultiGramModel::train(&lines, &tokenizer(), 2).unwrap();
		let distribution = model.predict(&[5]).unwrap();
		assert_normalized(&distribution);
		assert!(distribution[1..5].iter().all(|p| (p - 0.25).abs() < 1e-6));
		assert_eq!(distribution[5], 0.0);
	}

	#[test]
	fn unknown_words_break_ngrams() {
		let mut model = MultiGramModel::new(6, 2).unwrap();
		model.add_sentence("el perro come", &tokenizer());
		let distribution = model.predict(&[1]).unwrap();
		// "el" -> "come" was never adjacent, only unigrams remain
		assert!((distribution[1] - 0.5).abs() < 1e-6);
		assert!((distribution[3] - 0.5).abs() < 1e-6);
	}

	#[test]
	fn parallel_training_matches_sequential() {
		let lines: Vec<String> = (0..200)
			.map(|i| if i % 2 == 0 { "el gato come" } else { "el gato duerme" })
			.map(str::to_owned)
			.collect();
		let trained = MultiGramModel::train(&lines, &tokenizer(), 3).unwrap();

		let mut sequential = MultiGramModel::new(tokenizer().vocab_size(), 3).unwrap();
		for line in &lines {
			sequential.add_sentence(line, &tokenizer());
		}

		assert_eq!(trained.predict(&[1, 2]).unwrap(), sequential.predict(&[1, 2]).unwrap());
	}

	#[test]
	fn merge_rejects_other_vocabulary() {
		let mut a = MultiGramModel::new(5, 2).unwrap();
		let b = MultiGramModel::new(6, 2).unwrap();
		assert!(matches!(a.merge(&b), Err(GenError::ModelMismatch(_))));
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cats.bin");
		let model = MultiGramModel::train(&["el gato come pescado"], &tokenizer(), 3).unwrap();
		model.save(&path).unwrap();

		let loaded = MultiGramModel::load(&path).unwrap();
		assert_eq!(loaded.max_order(), 3);
		assert_eq!(loaded.predict(&[1, 2]).unwrap(), model.predict(&[1, 2]).unwrap());
	}

	#[test]
	fn load_rejects_garbage() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.bin");
		std::fs::write(&path, b"\xff\xff\xff").unwrap();
		assert!(MultiGramModel::load(&path).is_err());
	}

	fn write_raw(path: &Path, model: &MultiGramModel) {
		std::fs::write(path, postcard::to_stdvec(model).unwrap()).unwrap();
	}

	#[test]
	fn load_rejects_empty_vocabulary() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("empty.bin");
		let forged = MultiGramModel { vocab_size: 0, max_order: 2, unigrams: vec![], ngrams: BTreeMap::new() };
		write_raw(&path, &forged);

		assert!(matches!(MultiGramModel::load(&path), Err(GenError::InvalidConfig(_))));
	}

	#[test]
	fn load_rejects_misplaced_ngram_tables() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tables.bin");

		let mut beyond_order = MultiGramModel::new(5, 3).unwrap();
		beyond_order.ngrams.insert(5, NGramModel::new(5).unwrap());
		write_raw(&path, &beyond_order);
		assert!(matches!(MultiGramModel::load(&path), Err(GenError::InvalidConfig(_))));

		let mut wrong_key = MultiGramModel::new(5, 3).unwrap();
		wrong_key.ngrams.insert(2, NGramModel::new(3).unwrap());
		write_raw(&path, &wrong_key);
		assert!(matches!(MultiGramModel::load(&path), Err(GenError::InvalidConfig(_))));

		write_raw(&path, &MultiGramModel::new(5, 3).unwrap());
		assert!(MultiGramModel::load(&path).is_ok());
	}
}
