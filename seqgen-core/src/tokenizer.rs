use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::text::normalize;

/// Reserved vocabulary index meaning "no token" (padding or unknown word).
///
/// It is never assigned to a word and never a valid generation output.
pub const PADDING_ID: u32 = 0;

/// Word-level vocabulary mapping words to indices and back.
///
/// Indices start at 1; [`PADDING_ID`] is reserved.
///
/// ## Persistence
/// Stored as JSON. Two layouts are accepted when loading:
/// - `{"word_index": {"hola": 1}, "index_word": {"1": "hola"}}`
/// - a flat `{"hola": 1}` map (the reverse map is derived)
///
/// Saving always writes the first layout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "TokenizerFile")]
pub struct Tokenizer {
	word_index: HashMap<String, u32>,
	index_word: BTreeMap<u32, String>,
}

/// On-disk layouts accepted by [`Tokenizer`] deserialization.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenizerFile {
	Full {
		word_index: HashMap<String, u32>,
		// JSON object keys are strings; parsed in `From`.
		#[serde(default)]
		index_word: BTreeMap<String, String>,
	},
	Flat(HashMap<String, u32>),
}

impl From<TokenizerFile> for Tokenizer {
	fn from(file: TokenizerFile) -> Self {
		match file {
			TokenizerFile::Full { word_index, index_word } if !index_word.is_empty() => {
				let index_word = index_word
					.into_iter()
					.filter_map(|(index, word)| Some((index.parse::<u32>().ok()?, word)))
					.filter(|(index, _)| *index != PADDING_ID)
					.collect();
				Self { word_index, index_word }
			}
			TokenizerFile::Full { word_index, .. } | TokenizerFile::Flat(word_index) => Self::new(word_index),
		}
	}
}

impl Tokenizer {
	/// Builds a tokenizer from a `word -> index` map, deriving the reverse map.
	///
	/// Entries pointing at [`PADDING_ID`] stay encodable (they encode to
	/// padding anyway) but are never decoded.
	pub fn new(word_index: HashMap<String, u32>) -> Self {
		let index_word = word_index
			.iter()
			.filter(|(_, index)| **index != PADDING_ID)
			.map(|(word, index)| (*index, word.clone()))
			.collect();
		Self { word_index, index_word }
	}

	/// Fits a vocabulary on a set of texts.
	///
	/// Texts are normalized like prompts, words are counted, and indices are
	/// assigned from 1 by descending frequency. Ties keep first-seen order.
	pub fn fit_on_texts<I, S>(texts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		// word -> (count, first seen position)
		let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
		for text in texts {
			for word in normalize(text.as_ref()).split(' ').filter(|w| !w.is_empty()) {
				let seen = counts.len();
				counts.entry(word.to_owned()).or_insert((0, seen)).0 += 1;
			}
		}

		let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
		ranked.sort_by(|(_, (count_a, seen_a)), (_, (count_b, seen_b))| {
			count_b.cmp(count_a).then(seen_a.cmp(seen_b))
		});

		let word_index = ranked
			.into_iter()
			.enumerate()
			.map(|(rank, (word, _))| (word, rank as u32 + 1))
			.collect();
		Self::new(word_index)
	}

	/// Parses a tokenizer from its JSON representation.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Loads a tokenizer from a JSON file.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let contents = fs::read_to_string(path)?;
		Self::from_json(&contents)
	}

	/// Writes the tokenizer as pretty JSON, creating parent directories.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Returns the index of a word, if known.
	pub fn index_of(&self, word: &str) -> Option<u32> {
		self.word_index.get(word).copied()
	}

	/// Encodes a single word; unknown words map to [`PADDING_ID`].
	pub fn encode_word(&self, word: &str) -> u32 {
		self.index_of(word).unwrap_or(PADDING_ID)
	}

	/// Returns the word stored at `index`, if any.
	pub fn word_of(&self, index: u32) -> Option<&str> {
		self.index_word.get(&index).map(String::as_str)
	}

	/// Number of vocabulary slots a model over this tokenizer must cover
	/// (highest index + 1, padding slot included).
	pub fn vocab_size(&self) -> usize {
		self.index_word.keys().next_back().map_or(1, |max| *max as usize + 1)
	}

	/// Number of decodable words.
	pub fn len(&self) -> usize {
		self.index_word.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index_word.is_empty()
	}
}
