//! Arguments

// Imports
use {
	std::path::PathBuf,
	thrasher::permutation::DEFAULT_SEED,
	thrasher_util::{ParseShorthand, ShorthandBase, ShorthandError},
};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
#[clap(about = "Generates a single-cycle permutation file for `thrasher -m file`")]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Output file
	#[clap(short = 'o')]
	pub output_file: PathBuf,

	/// Output file size, in bytes (e.g. `1G`).
	///
	/// Must be a multiple of 8.
	#[clap(short = 's', value_parser = parse_size)]
	pub size: u64,

	/// Seed
	#[clap(long = "seed", default_value_t = DEFAULT_SEED)]
	pub seed: u64,

	/// Whether to read the file back and check that it's a single cycle
	#[clap(long = "verify")]
	pub verify: bool,
}

/// Parses a byte size shorthand
fn parse_size(s: &str) -> Result<u64, ShorthandError> {
	s.parse_shorthand(ShorthandBase::Binary)
}

#[cfg(test)]
mod tests {
	use {super::*, clap::Parser, thrasher_util::cli};

	#[test]
	fn parses_flags() {
		let args = Args::try_parse_from(["thrasher-rgen", "-o", "perm.bin", "-s", "1M"]).expect("Valid arguments");
		assert_eq!(args.output_file, PathBuf::from("perm.bin"));
		assert_eq!(args.size, 1 << 20);
		assert_eq!(args.seed, DEFAULT_SEED);
		assert!(!args.verify);
	}

	#[test]
	fn requires_output_and_size() {
		assert!(Args::try_parse_from(["thrasher-rgen", "-s", "1M"]).is_err());
		assert!(Args::try_parse_from(["thrasher-rgen", "-o", "perm.bin"]).is_err());

		let err = cli::parse_args_from::<Args, _, _>(["thrasher-rgen", "-o", "perm.bin"]).expect_err("Missing size");
		assert!(err.contains("-s"), "Unexpected error: {err:?}");
		assert!(!err.contains('\n'), "Unexpected error: {err:?}");
	}
}
