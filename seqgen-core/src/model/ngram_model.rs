use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::state::State;

/// Word n-gram table of a fixed order.
///
/// Stores one [`State`] per observed `(n-1)`-token prefix.
///
/// # Invariants
/// - `n` is always >= 2
/// - Each key in `states` has length `n-1`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NGramModel {
	/// The order of the model (number of tokens in the n-gram)
	n: usize,

	/// Mapping from a prefix (length n-1) to its corresponding state
	states: HashMap<Vec<u32>, State>,
}

impl NGramModel {
	/// Creates a new n-gram model of order `n`.
	///
	/// # Errors
	/// Returns an error if `n < 2`.
	pub fn new(n: usize) -> Result<Self, String> {
		if n < 2 {
			return Err("n must be >= 2".to_owned());
		}
		Ok(Self { n, states: HashMap::new() })
	}

	pub fn order(&self) -> usize {
		self.n
	}

	/// Adds every n-gram of an encoded sentence.
	///
	/// Sentences shorter than `n` contribute nothing.
	pub fn add_sequence(&mut self, tokens: &[u32]) {
		if tokens.len() < self.n {
			return;
		}

		for window in tokens.windows(self.n) {
			let (prefix, next) = window.split_at(self.n - 1);
			self.states
				.entry(prefix.to_vec())
				.or_insert_with(|| State::new(prefix))
				.add_transition(next[0]);
		}
	}

	/// Returns the state for the last `n-1` tokens of `context`.
	///
	/// Returns `None` if the context is too short or the prefix is unknown.
	pub fn state_for(&self, context: &[u32]) -> Option<&State> {
		let prefix_len = self.n - 1;
		if context.len() < prefix_len {
			return None;
		}
		self.states.get(&context[context.len() - prefix_len..])
	}

	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Merges another n-gram model into this one.
	///
	/// # Errors
	/// Returns an error if the model orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), String> {
		if self.n != other.n {
			return Err("N mismatch".to_owned());
		}

		for (key, state) in &other.states {
			if let Some(existing) = self.states.get_mut(key) {
				existing.merge(state)?;
			} else {
				self.states.insert(key.clone(), state.clone());
			}
		}

		Ok(())
	}
}
