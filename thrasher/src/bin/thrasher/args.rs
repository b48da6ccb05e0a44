//! Arguments

// Imports
use {
	std::path::PathBuf,
	thrasher::{Iterations, Mode, RawConfig},
	thrasher_util::{ParseShorthand, ShorthandBase, ShorthandError},
};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
#[clap(about = "Thrashes memory with sequential, random or pointer-chasing accesses")]
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

	/// Config file
	///
	/// Json file with any of the settings below.
	/// Settings passed on the command line take precedence.
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,

	/// Iteration mode
	#[clap(short = 'm', value_enum, ignore_case = true)]
	pub mode: Option<Mode>,

	/// Arena size, in bytes (e.g. `4G`)
	#[clap(short = 'a', value_parser = parse_size)]
	pub arena_size: Option<u64>,

	/// Block size, in bytes (e.g. `4K`)
	#[clap(short = 'b', value_parser = parse_size)]
	pub block_size: Option<u64>,

	/// Input permutation file, for `file` mode
	#[clap(short = 'i')]
	pub input: Option<PathBuf>,

	/// Total iterations across all threads (e.g. `10M`), or `-1` to run forever
	#[clap(short = 'n', allow_negative_numbers = true)]
	pub iterations: Option<Iterations>,

	/// Number of threads
	#[clap(short = 't')]
	pub threads: Option<usize>,

	/// Number of locks, `0` to not lock
	#[clap(short = 'l')]
	pub locks: Option<usize>,
}

impl Args {
	/// Returns the configuration given by these arguments
	pub fn raw_config(&self) -> RawConfig {
		RawConfig {
			mode:       self.mode,
			arena_size: self.arena_size,
			block_size: self.block_size,
			input:      self.input.clone(),
			iterations: self.iterations,
			threads:    self.threads,
			locks:      self.locks,
		}
	}
}

/// Parses a byte size shorthand
fn parse_size(s: &str) -> Result<u64, ShorthandError> {
	s.parse_shorthand(ShorthandBase::Binary)
}
