use std::fs;
use std::path::PathBuf;

use clap::Parser;

use seqgen_core::io::{build_output_path, read_lines};
use seqgen_core::model::multigram_model::MultiGramModel;
use seqgen_core::Tokenizer;

/// Fits a tokenizer and trains one n-gram model per corpus file.
#[derive(Parser, Debug)]
#[command(name = "seqgen-train", version, about = "Train n-gram artifacts for seqgen-server")]
struct TrainArgs {
	/// Text corpora, one sentence per line
	#[arg(long, required = true, num_args = 1..)]
	corpus: Vec<PathBuf>,

	/// Where `<corpus name>.bin` models are written
	#[arg(long, default_value = "model/trained_model")]
	out_dir: PathBuf,

	/// Tokenizer JSON file to write (or read with --reuse-tokenizer)
	#[arg(long, default_value = "model/tokenizer/tokenizer.json")]
	tokenizer: PathBuf,

	/// Highest n-gram order
	#[arg(long, default_value_t = 3)]
	order: usize,

	/// Keep the existing tokenizer instead of fitting a new one
	#[arg(long)]
	reuse_tokenizer: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = TrainArgs::parse();

	// Read every corpus once; the tokenizer is shared by all models
	let mut corpora = Vec::with_capacity(args.corpus.len());
	for path in &args.corpus {
		let lines = read_lines(path)?;
		log::info!("read {} lines from {}", lines.len(), path.display());
		corpora.push((path, lines));
	}

	let tokenizer = if args.reuse_tokenizer {
		Tokenizer::load(&args.tokenizer)?
	} else {
		let tokenizer = Tokenizer::fit_on_texts(corpora.iter().flat_map(|(_, lines)| lines.iter()));
		tokenizer.save(&args.tokenizer)?;
		log::info!("wrote tokenizer with {} words to {}", tokenizer.len(), args.tokenizer.display());
		tokenizer
	};
	if tokenizer.is_empty() {
		return Err("the tokenizer has no words, nothing to train".into());
	}

	fs::create_dir_all(&args.out_dir)?;
	for (path, lines) in &corpora {
		let model = MultiGramModel::train(lines, &tokenizer, args.order)?;
		let output = build_output_path(path, &args.out_dir, "bin")?;
		model.save(&output)?;
		log::info!("wrote {}-gram model to {}", args.order, output.display());
	}

	Ok(())
}
