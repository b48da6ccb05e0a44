//! Thrasher

// Imports
use {
	crate::{
		arena::Arena,
		config::{Config, Layout},
		pool::{Access, LockPool, WorkerPool, WorkerReport},
	},
	anyhow::Context,
};

/// Thrasher.
///
/// Owns the arena and locks for a run. Both are released on drop.
#[derive(Debug)]
pub struct Thrasher {
	/// Config
	config: Config,

	/// Arena
	arena: Arena,

	/// Locks
	locks: LockPool,
}

impl Thrasher {
	/// Maps the arena and creates the locks for `config`.
	///
	/// # Errors
	/// Returns an error if unable to map the arena.
	pub fn new(config: Config) -> Result<Self, anyhow::Error> {
		let arena = match &config.layout {
			Layout::Sequential(geometry) | Layout::Random(geometry) =>
				Arena::anonymous(geometry.arena_size(), geometry.block_size()).context("Unable to create arena")?,
			Layout::File(path) => Arena::from_file(path).context("Unable to create arena from permutation file")?,
		};
		tracing::info!(mode = ?config.mode(), len = arena.len(), "Created arena");

		let locks = LockPool::new(config.n_locks);

		Ok(Self { config, arena, locks })
	}

	/// Returns the config
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the arena
	pub fn arena(&self) -> &Arena {
		&self.arena
	}

	/// Runs all workers.
	///
	/// With infinite iterations, this never returns.
	///
	/// # Errors
	/// Returns an error if any worker fails, including when a pointer chaser
	/// reaches a cell that points outside of the arena.
	pub fn run(&self) -> Result<RunOutput, anyhow::Error> {
		let access = match self.config.layout {
			Layout::Sequential(geometry) => Access::Sequential(geometry),
			Layout::Random(geometry) => Access::Random(geometry),
			Layout::File(_) => Access::PointerChase,
		};

		let pool = WorkerPool::new(
			&self.arena,
			access,
			self.config.n_threads,
			self.config.iterations,
			&self.locks,
		)?;
		let workers = pool.run().context("Unable to run workers")?;
		tracing::info!("Done");

		Ok(RunOutput { workers })
	}
}

/// Output for [`Thrasher::run`]
#[derive(Clone, Debug)]
pub struct RunOutput {
	/// Reports of every worker
	pub workers: Vec<WorkerReport>,
}

impl RunOutput {
	/// Returns the total number of visits across all workers
	pub fn total_visits(&self) -> u64 {
		self.workers.iter().map(|worker| worker.visits).sum()
	}
}
