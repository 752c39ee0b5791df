use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// Reads a text file and returns all its non-blank lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(str::to_owned)
		.collect())
}

/// Builds an artifact path inside `output_dir` from an input file name
/// and a new extension.
///
/// Example:
/// `corpus/poems.txt` + `out` + `"bin"` → `out/poems.bin`
pub fn build_output_path<P, D>(input_path: P, output_dir: D, output_extension: &str) -> io::Result<PathBuf>
where
	P: AsRef<Path>,
	D: AsRef<Path>,
{
	let mut output = output_dir.as_ref().join(get_filename(input_path)?);
	output.set_extension(output_extension);
	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./model/trained_model/poems.bin"` → `"poems"`
/// - `"poems.bin"` → `"poems"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub(crate) fn normalize_folder<P: AsRef<Path>>(input: P) -> PathBuf {
	let input = input.as_ref();
	if input == Path::new(".") || input == Path::new("./") {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		input.to_path_buf()
	}
}

/// Lists all files in a directory whose extension is one of `extensions`.
///
/// Returns full paths, sorted so that loading order is stable.
/// Subdirectories are ignored.
pub(crate) fn list_files<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if !path.is_file() {
			continue;
		}
		let matches = path
			.extension()
			.and_then(OsStr::to_str)
			.is_some_and(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)));
		if matches {
			files.push(path);
		}
	}

	files.sort();
	Ok(files)
}
