//! Configuration

// Imports
use {
	crate::traversal::BlockGeometry,
	anyhow::Context,
	std::{
		fmt,
		fs,
		path::{Path, PathBuf},
		str::FromStr,
		thread,
	},
	thrasher_util::{ParseShorthand, ShorthandBase, ShorthandError},
};

/// Iteration mode
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// Visit blocks in order
	Sequential,

	/// Visit uniformly random blocks
	Random,

	/// Chase pointers through a permutation file
	File,
}

/// Iteration budget
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Deserialize)]
#[serde(try_from = "i64")]
pub enum Iterations {
	/// A fixed number of iterations
	Finite(u64),

	/// Iterate until killed
	Infinite,
}

impl Iterations {
	/// Returns the iterations each of `n_threads` workers performs.
	///
	/// Uses integer division, so up to `n_threads - 1` iterations may be
	/// dropped. See [`Self::shortfall`].
	pub fn per_worker(self, n_threads: usize) -> Self {
		match self {
			Self::Finite(count) => Self::Finite(count / n_threads as u64),
			Self::Infinite => Self::Infinite,
		}
	}

	/// Returns how many iterations are dropped when splitting over `n_threads` workers
	pub fn shortfall(self, n_threads: usize) -> u64 {
		match self {
			Self::Finite(count) => count % n_threads as u64,
			Self::Infinite => 0,
		}
	}
}

impl TryFrom<i64> for Iterations {
	type Error = String;

	fn try_from(count: i64) -> Result<Self, Self::Error> {
		match count {
			-1 => Ok(Self::Infinite),
			// Note: Non-negative `i64`s always fit in a `u64`
			0..=i64::MAX => Ok(Self::Finite(count as u64)),
			_ => Err(format!("Invalid iteration count {count}, expected -1 or a non-negative number")),
		}
	}
}

/// Parses `-1`, `inf` or `infinite` as [`Iterations::Infinite`], and a base-1000 shorthand
/// integer (e.g. `10M`) as [`Iterations::Finite`].
impl FromStr for Iterations {
	type Err = ShorthandError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		match s {
			"-1" => Ok(Self::Infinite),
			_ if s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("infinite") => Ok(Self::Infinite),
			_ => s.parse_shorthand(ShorthandBase::Decimal).map(Self::Finite),
		}
	}
}

impl fmt::Display for Iterations {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Finite(count) => write!(f, "{count}"),
			Self::Infinite => write!(f, "infinite"),
		}
	}
}

/// Unvalidated configuration.
///
/// Every field is optional, so configurations from different sources
/// can be layered with [`Self::or`] before validating.
#[derive(PartialEq, Eq, Clone, Default, Debug)]
#[derive(serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
	/// Iteration mode
	pub mode: Option<Mode>,

	/// Arena size, in bytes
	pub arena_size: Option<u64>,

	/// Block size, in bytes
	pub block_size: Option<u64>,

	/// Permutation file
	pub input: Option<PathBuf>,

	/// Total iterations
	pub iterations: Option<Iterations>,

	/// Number of worker threads
	pub threads: Option<usize>,

	/// Number of locks
	pub locks: Option<usize>,
}

impl RawConfig {
	/// Fills in any field missing in `self` with the one from `fallback`
	#[must_use]
	pub fn merge(self, fallback: Self) -> Self {
		Self {
			mode:       self.mode.or(fallback.mode),
			arena_size: self.arena_size.or(fallback.arena_size),
			block_size: self.block_size.or(fallback.block_size),
			input:      self.input.or(fallback.input),
			iterations: self.iterations.or(fallback.iterations),
			threads:    self.threads.or(fallback.threads),
			locks:      self.locks.or(fallback.locks),
		}
	}

	/// Reads a configuration from a json file
	pub fn from_json_file(path: &Path) -> Result<Self, anyhow::Error> {
		let config_file = fs::File::open(path).context("Unable to open config file")?;
		serde_json::from_reader(config_file).context("Unable to parse config file")
	}
}

/// Arena layout, by mode
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Layout {
	/// Anonymous arena, visited sequentially
	Sequential(BlockGeometry),

	/// Anonymous arena, visited randomly
	Random(BlockGeometry),

	/// Permutation file, pointer-chased
	File(PathBuf),
}

/// Configuration
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Config {
	/// Layout
	pub layout: Layout,

	/// Total iterations, across all workers
	pub iterations: Iterations,

	/// Number of worker threads
	pub n_threads: usize,

	/// Number of locks.
	///
	/// Zero disables locking altogether.
	pub n_locks: usize,
}

impl Config {
	/// Validates a raw configuration.
	///
	/// Nothing is allocated or mapped here, so invalid configurations
	/// are rejected before touching any memory.
	pub fn from_raw(raw: RawConfig) -> Result<Self, anyhow::Error> {
		let mode = raw
			.mode
			.context("Must specify iteration mode: <-m file|sequential|random>")?;

		let layout = match mode {
			Mode::File => {
				let input = raw
					.input
					.context("Must specify input file path: <-i INPUT_FILEPATH>")?;
				if raw.arena_size.is_some() || raw.block_size.is_some() {
					tracing::debug!("Ignoring arena and block sizes, the permutation file's size is used instead");
				}

				Layout::File(input)
			},
			Mode::Sequential | Mode::Random => {
				let arena_size = raw
					.arena_size
					.filter(|&size| size != 0)
					.context("Must specify non-zero arena size: <-a N_BYTES>")?;
				let block_size = raw
					.block_size
					.filter(|&size| size != 0)
					.context("Must specify non-zero block size: <-b N_BYTES>")?;
				let arena_size = usize::try_from(arena_size).context("Arena size doesn't fit in memory")?;
				let block_size = usize::try_from(block_size).context("Block size doesn't fit in memory")?;

				let geometry = BlockGeometry::new(arena_size, block_size)?;
				match mode {
					Mode::Sequential => Layout::Sequential(geometry),
					_ => Layout::Random(geometry),
				}
			},
		};

		let iterations = raw
			.iterations
			.filter(|&iterations| iterations != Iterations::Finite(0))
			.context("Must specify non-zero iterations (-1 for infinite): <-n N_ITERATIONS>")?;

		let n_threads = raw
			.threads
			.filter(|&threads| threads != 0)
			.context("Must specify non-zero number of threads: <-t N_THREADS>")?;
		match thread::available_parallelism() {
			Ok(n_hw_threads) if n_threads > n_hw_threads.get() => tracing::warn!(
				"Running with more threads than are available on the system ({n_hw_threads})"
			),
			Ok(_) => (),
			Err(err) => tracing::debug!(?err, "Unable to get available parallelism"),
		}

		let n_locks = raw.locks.context("Must specify number of locks: <-l N_LOCKS>")?;

		Ok(Self {
			layout,
			iterations,
			n_threads,
			n_locks,
		})
	}

	/// Returns the mode
	pub fn mode(&self) -> Mode {
		match self.layout {
			Layout::Sequential(_) => Mode::Sequential,
			Layout::Random(_) => Mode::Random,
			Layout::File(_) => Mode::File,
		}
	}
}
