use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;

use crate::error::{GenError, Result};
use crate::io;
use crate::model::generator::{Generation, Generator, Progress};
use crate::model::multigram_model::MultiGramModel;
use crate::model::LanguageModel;
use crate::tokenizer::Tokenizer;

/// File extensions scanned as model artifacts.
pub const MODEL_EXTENSIONS: &[&str] = &["bin", "keras", "h5"];

/// Scanned extensions whose format cannot be run here; such files are
/// logged and skipped.
pub const UNSUPPORTED_MODEL_EXTENSIONS: &[&str] = &["keras", "h5"];

fn is_unsupported(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| UNSUPPORTED_MODEL_EXTENSIONS.iter().any(|u| ext.eq_ignore_ascii_case(u)))
}

/// Models and tokenizer loaded once at startup.
///
/// # Responsibilities
/// - Discover model artifacts in a directory, keyed by file stem
/// - Hold the optional tokenizer
/// - Resolve a model by name (or the default one) and run generation
///
/// Nothing here is mutated after construction, so one instance can be
/// shared by reference between all requests.
pub struct Artifacts {
	models: BTreeMap<String, Box<dyn LanguageModel>>,
	tokenizer: Option<Tokenizer>,
}

impl Artifacts {
	/// Builds a context from already loaded parts.
	pub fn new(models: BTreeMap<String, Box<dyn LanguageModel>>, tokenizer: Option<Tokenizer>) -> Self {
		Self { models, tokenizer }
	}

	/// Loads every model artifact of `model_dir` and the tokenizer at
	/// `tokenizer_path`.
	///
	/// # Behavior
	/// - Lists files with an extension from [`MODEL_EXTENSIONS`] (not recursive).
	/// - Loads each one as a [`MultiGramModel`]; the model name is the file stem.
	/// - A file that fails to load, or has an extension from
	///   [`UNSUPPORTED_MODEL_EXTENSIONS`], is logged and skipped.
	/// - A missing directory or tokenizer is logged; the service then runs
	///   degraded and requests fail with an explicit error.
	pub fn load<P, T>(model_dir: P, tokenizer_path: T) -> Self
	where
		P: AsRef<Path>,
		T: AsRef<Path>,
	{
		let folder = io::normalize_folder(model_dir);
		let mut models: BTreeMap<String, Box<dyn LanguageModel>> = BTreeMap::new();

		match io::list_files(&folder, MODEL_EXTENSIONS) {
			Ok(files) => {
				for path in files {
					let name = match io::get_filename(&path) {
						Ok(name) => name,
						Err(e) => {
							log::warn!("skipping {}: {e}", path.display());
							continue;
						}
					};
					if is_unsupported(&path) {
						log::warn!("skipping model {}: unsupported format", path.display());
						continue;
					}
					match MultiGramModel::load(&path) {
						Ok(model) => {
							log::info!(
								"loaded model '{name}' (order {}, vocabulary {})",
								model.max_order(),
								model.vocab_size()
							);
							models.insert(name, Box::new(model));
						}
						Err(e) => log::warn!("skipping model {}: {e}", path.display()),
					}
				}
			}
			Err(e) => log::warn!("cannot read model directory {}: {e}", folder.display()),
		}

		let tokenizer_path = tokenizer_path.as_ref();
		let tokenizer = match Tokenizer::load(tokenizer_path) {
			Ok(tokenizer) => {
				log::info!("loaded tokenizer with {} words from {}", tokenizer.len(), tokenizer_path.display());
				Some(tokenizer)
			}
			Err(e) => {
				log::warn!("tokenizer not loaded from {}: {e}", tokenizer_path.display());
				None
			}
		};

		if models.is_empty() {
			log::warn!("no model loaded from {}", folder.display());
		}
		if let Some(tokenizer) = &tokenizer {
			for (name, model) in &models {
				if model.vocab_size() != tokenizer.vocab_size() {
					log::warn!(
						"model '{name}' covers {} indices but the tokenizer has {}",
						model.vocab_size(),
						tokenizer.vocab_size()
					);
				}
			}
		}

		Self::new(models, tokenizer)
	}

	/// Loaded model names, sorted.
	pub fn model_names(&self) -> Vec<&str> {
		self.models.keys().map(String::as_str).collect()
	}

	/// First model name in sorted order, used when a request names none.
	pub fn default_model_name(&self) -> Option<&str> {
		self.models.keys().next().map(String::as_str)
	}

	pub fn model(&self, name: &str) -> Option<&dyn LanguageModel> {
		self.models.get(name).map(|model| model.as_ref())
	}

	pub fn tokenizer(&self) -> Option<&Tokenizer> {
		self.tokenizer.as_ref()
	}

	pub fn has_models(&self) -> bool {
		!self.models.is_empty()
	}

	/// Resolves a requested model name; `None` or a blank name selects the
	/// default model.
	///
	/// # Errors
	/// - [`GenError::NoModels`] if nothing was loaded
	/// - [`GenError::ModelNotFound`] if the name is unknown
	pub fn resolve_model<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a dyn LanguageModel)> {
		let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
			Some(name) => name,
			None => self.default_model_name().ok_or(GenError::NoModels)?,
		};
		let model = self.model(name).ok_or_else(|| {
			if self.models.is_empty() {
				GenError::NoModels
			} else {
				GenError::ModelNotFound(name.to_owned())
			}
		})?;
		Ok((name, model))
	}

	/// Runs the whole pipeline for one request.
	pub fn generate<R: Rng>(
		&self,
		model_name: Option<&str>,
		prompt: &str,
		generator: &Generator,
		rng: &mut R,
	) -> Result<Generation> {
		self.generate_with_abort(model_name, prompt, generator, rng, |_| false)
	}

	/// Runs the whole pipeline for one request with an abort hook.
	pub fn generate_with_abort<R, F>(
		&self,
		model_name: Option<&str>,
		prompt: &str,
		generator: &Generator,
		rng: &mut R,
		abort: F,
	) -> Result<Generation>
	where
		R: Rng,
		F: FnMut(&Progress) -> bool,
	{
		let (name, model) = self.resolve_model(model_name)?;
		log::debug!("generating with model '{name}'");
		generator.generate_with_abort(model, self.tokenizer(), prompt, rng, abort)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::fs;

	use rand::rngs::StdRng;
	use rand::SeedableRng;

	use super::*;
	use crate::model::generation_config::GenerationConfig;

	fn tokenizer() -> Tokenizer {
		Tokenizer::new(HashMap::from([
			("hola".to_owned(), 1),
			("como".to_owned(), 2),
			("estas".to_owned(), 3),
		]))
	}

	fn write_artifacts(dir: &Path) {
		let tokenizer = tokenizer();
		tokenizer.save(dir.join("tokenizer.json")).unwrap();

		let models = dir.join("models");
		fs::create_dir(&models).unwrap();
		MultiGramModel::train(&["hola como estas"], &tokenizer, 2)
			.unwrap()
			.save(models.join("saludos.bin"))
			.unwrap();
		MultiGramModel::train(&["estas como hola"], &tokenizer, 3)
			.unwrap()
			.save(models.join("alreves.bin"))
			.unwrap();
		fs::write(models.join("corrupt.bin"), b"not a model").unwrap();
		// Postcard layout of a model with no vocabulary and no tables
		fs::write(models.join("empty.bin"), postcard::to_stdvec(&(0_usize, 2_usize, Vec::<usize>::new(), 0_usize)).unwrap()).unwrap();
		fs::write(models.join("legacy.h5"), b"\x89HDF\r\n\x1a\n").unwrap();
		fs::write(models.join("legacy.KERAS"), b"PK\x03\x04").unwrap();
		fs::write(models.join("README.txt"), b"ignored").unwrap();
	}

	#[test]
	fn loads_valid_models_and_skips_corrupt_ones() {
		let dir = tempfile::tempdir().unwrap();
		write_artifacts(dir.path());

		let artifacts = Artifacts::load(dir.path().join("models"), dir.path().join("tokenizer.json"));
		assert_eq!(artifacts.model_names(), vec!["alreves", "saludos"]);
		assert_eq!(artifacts.default_model_name(), Some("alreves"));
		assert_eq!(artifacts.tokenizer(), Some(&tokenizer()));
		assert!(artifacts.model("legacy").is_none());
		assert!(artifacts.model("empty").is_none());
	}

	#[test]
	fn keras_and_h5_files_are_recognized_but_unsupported() {
		assert!(is_unsupported(Path::new("models/poems.h5")));
		assert!(is_unsupported(Path::new("models/poems.Keras")));
		assert!(!is_unsupported(Path::new("models/poems.bin")));

		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("poems.h5"), b"").unwrap();
		fs::write(dir.path().join("poems.keras"), b"").unwrap();
		let found = io::list_files(dir.path(), MODEL_EXTENSIONS).unwrap();
		assert_eq!(found.len(), 2);
	}

	#[test]
	fn missing_paths_degrade_instead_of_failing() {
		let dir = tempfile::tempdir().unwrap();
		let artifacts = Artifacts::load(dir.path().join("nope"), dir.path().join("nope.json"));
		assert!(!artifacts.has_models());
		assert!(artifacts.tokenizer().is_none());

		let generator = Generator::new(GenerationConfig::default()).unwrap();
		let err = artifacts
			.generate(None, "hola", &generator, &mut StdRng::seed_from_u64(0))
			.unwrap_err();
		assert!(matches!(err, GenError::NoModels));
	}

	#[test]
	fn resolves_default_and_named_models() {
		let dir = tempfile::tempdir().unwrap();
		write_artifacts(dir.path());
		let artifacts = Artifacts::load(dir.path().join("models"), dir.path().join("tokenizer.json"));

		assert_eq!(artifacts.resolve_model(None).unwrap().0, "alreves");
		assert_eq!(artifacts.resolve_model(Some("  ")).unwrap().0, "alreves");
		assert_eq!(artifacts.resolve_model(Some("saludos")).unwrap().0, "saludos");
		assert!(matches!(
			artifacts.resolve_model(Some("corrupt")),
			Err(GenError::ModelNotFound(name)) if name == "corrupt"
		));
	}

	#[test]
	fn generates_with_loaded_artifacts() {
		let dir = tempfile::tempdir().unwrap();
		write_artifacts(dir.path());
		let artifacts = Artifacts::load(dir.path().join("models"), dir.path().join("tokenizer.json"));

		let generator = Generator::new(GenerationConfig { max_new_tokens: 10, ..Default::default() }).unwrap();
		let generation = artifacts
			.generate(Some("saludos"), "hola", &generator, &mut StdRng::seed_from_u64(42))
			.unwrap();
		assert_eq!(generation.words.len(), 10);
		assert!(generation.words.iter().all(|w| ["hola", "como", "estas"].contains(&w.as_str())));
	}

	#[test]
	fn generation_without_tokenizer_fails() {
		let dir = tempfile::tempdir().unwrap();
		write_artifacts(dir.path());
		let artifacts = Artifacts::load(dir.path().join("models"), dir.path().join("missing.json"));

		let generator = Generator::new(GenerationConfig::default()).unwrap();
		let err = artifacts
			.generate(None, "hola", &generator, &mut StdRng::seed_from_u64(0))
			.unwrap_err();
		assert!(matches!(err, GenError::TokenizerMissing));
		assert_eq!(err.to_string(), "tokenizer is not loaded");
	}
}
