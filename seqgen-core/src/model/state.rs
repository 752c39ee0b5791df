use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Represents a context state in a word n-gram model.
///
/// A `State` corresponds to a fixed (n-1)-token prefix (`key`) and stores
/// all observed transitions from this prefix to the next token.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - Each transition occurrence count is strictly positive
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct State {
	/// Token prefix identifying this state.
	key: Vec<u32>,
	/// Outgoing transitions indexed by the next token.
	/// Example: { 7 => 42, 12 => 3 }
	transitions: HashMap<u32, usize>,
}

impl State {
	/// Creates a new empty state for the given prefix.
	pub fn new(key: &[u32]) -> Self {
		Self {
			key: key.to_vec(),
			transitions: HashMap::new(),
		}
	}

	/// Records an occurrence of a transition toward `next`.
	pub fn add_transition(&mut self, next: u32) {
		*self.transitions.entry(next).or_insert(0) += 1;
	}

	/// Total number of observed transitions.
	pub fn total(&self) -> usize {
		self.transitions.values().sum()
	}

	/// Adds this state's relative transition frequencies, scaled by
	/// `weight`, into `distribution`.
	///
	/// Tokens outside `distribution` are ignored.
	pub fn accumulate(&self, distribution: &mut [f32], weight: f32) {
		let total = self.total();
		if total == 0 {
			return;
		}
		for (next, occurrence) in &self.transitions {
			if let Some(slot) = distribution.get_mut(*next as usize) {
				*slot += weight * (*occurrence as f32 / total as f32);
			}
		}
	}

	/// Merges another state into this one, summing occurrence counts.
	///
	/// # Errors
	/// Returns an error if the state keys do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), String> {
		if self.key != other.key {
			return Err("Key mismatch".to_owned());
		}

		for (next, occurrence) in &other.transitions {
			*self.transitions.entry(*next).or_insert(0) += *occurrence;
		}

		Ok(())
	}
}
