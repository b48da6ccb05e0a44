//! Worker pool

// Imports
use {
	crate::{
		arena::Arena,
		config::Iterations,
		traversal::{BlockGeometry, Blocks, PointerChase, Random, Sequential, Traversal},
	},
	anyhow::Context,
	std::{
		any::Any,
		hint,
		sync::{Mutex, PoisonError},
		thread,
	},
};

/// Worker pool.
///
/// Runs one worker thread per configured thread over a shared arena.
#[derive(Debug)]
pub struct WorkerPool<'a> {
	/// Arena
	arena: &'a Arena,

	/// Access pattern
	access: Access,

	/// Number of worker threads
	n_threads: usize,

	/// Total iterations
	iterations: Iterations,

	/// Locks
	locks: &'a LockPool,
}

impl<'a> WorkerPool<'a> {
	/// Creates a new worker pool
	///
	/// # Errors
	/// Returns an error if `n_threads` is zero.
	pub fn new(
		arena: &'a Arena,
		access: Access,
		n_threads: usize,
		iterations: Iterations,
		locks: &'a LockPool,
	) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(n_threads > 0, "Must have at least one worker thread");

		Ok(Self {
			arena,
			access,
			n_threads,
			iterations,
			locks,
		})
	}

	/// Runs all workers to completion.
	///
	/// With infinite iterations, this never returns.
	pub fn run(&self) -> Result<Vec<WorkerReport>, anyhow::Error> {
		let worker_iterations = self.iterations.per_worker(self.n_threads);
		let shortfall = self.iterations.shortfall(self.n_threads);
		if shortfall != 0 {
			tracing::debug!(shortfall, "Iterations don't divide evenly between workers, dropping the rest");
		}

		tracing::info!(
			n_threads = self.n_threads,
			%worker_iterations,
			n_locks = self.locks.len(),
			"Kicking off worker threads"
		);
		let results = thread::scope(|scope| {
			let mut handles = Vec::with_capacity(self.n_threads);
			for thread_idx in 0..self.n_threads {
				let handle = thread::Builder::new()
					.name(format!("worker-{thread_idx}"))
					.spawn_scoped(scope, move || self.run_worker(thread_idx, worker_iterations))
					.with_context(|| format!("Unable to spawn worker {thread_idx}"))?;
				handles.push(handle);
			}

			// Note: We join every worker before looking at any result, so a failed
			//       worker doesn't leave the others to be joined implicitly.
			let results = handles.into_iter().map(thread::ScopedJoinHandle::join).collect::<Vec<_>>();
			Ok::<_, anyhow::Error>(results)
		})?;
		tracing::info!("Joined worker threads");

		results
			.into_iter()
			.enumerate()
			.map(|(thread_idx, res)| match res {
				Ok(res) => res.with_context(|| format!("Worker {thread_idx} failed")),
				Err(payload) => Err(anyhow::anyhow!(
					"Worker {thread_idx} panicked: {}",
					self::panic_message(&*payload)
				)),
			})
			.collect()
	}

	/// Runs worker `thread_idx`
	fn run_worker(&self, thread_idx: usize, iterations: Iterations) -> Result<WorkerReport, anyhow::Error> {
		// Note: The mode and the locking are chosen once here, so the
		//       hot loop is monomorphized for each combination.
		let visits = match self.access {
			Access::Sequential(geometry) => {
				let blocks = Blocks::new(self.arena, geometry)?;
				let start_block = geometry.start_block(thread_idx, self.n_threads);
				self.drive(Sequential::new(blocks, start_block), iterations)
			},
			Access::Random(geometry) => {
				let blocks = Blocks::new(self.arena, geometry)?;
				let start_block = geometry.start_block(thread_idx, self.n_threads);
				self.drive(Random::new(blocks, start_block, thread_idx as u64), iterations)
			},
			Access::PointerChase => {
				let traversal = PointerChase::new(self.arena.cells(), thread_idx)?;
				self.drive(traversal, iterations)
			},
		};

		tracing::info!(thread_idx, visits, "Worker done");
		Ok(WorkerReport { thread_idx, visits })
	}

	fn drive<T: Traversal>(&self, traversal: T, iterations: Iterations) -> u64 {
		match self.locks.is_empty() {
			true => self::run_traversal(traversal, &NoLocks, iterations),
			false => self::run_traversal(traversal, self.locks, iterations),
		}
	}
}

/// Runs `traversal` for `iterations` visits, locking each visit with `locks`.
///
/// Returns the number of visits.
pub fn run_traversal<T: Traversal, L: Locking>(mut traversal: T, locks: &L, iterations: Iterations) -> u64 {
	match iterations {
		Iterations::Finite(count) => {
			for _ in 0..count {
				let position = traversal.position();
				locks.with(position, || traversal.visit());
			}

			hint::black_box(traversal.position());
			count
		},
		Iterations::Infinite => loop {
			let position = traversal.position();
			locks.with(position, || traversal.visit());
		},
	}
}

/// Access pattern of the workers
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Access {
	/// Sequential blocks
	Sequential(BlockGeometry),

	/// Random blocks
	Random(BlockGeometry),

	/// Pointer chasing through the arena's cells
	PointerChase,
}

/// Worker report
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct WorkerReport {
	/// Thread index
	pub thread_idx: usize,

	/// Positions visited
	pub visits: u64,
}

/// Locking discipline around each visit
pub trait Locking: Sync {
	/// Runs `f`, which visits `position`, while holding the lock for it.
	fn with<R>(&self, position: usize, f: impl FnOnce() -> R) -> R;
}

/// No locking
#[derive(Clone, Copy, Debug)]
pub struct NoLocks;

impl Locking for NoLocks {
	#[inline]
	fn with<R>(&self, _position: usize, f: impl FnOnce() -> R) -> R {
		f()
	}
}

/// Lock pool.
///
/// Position `p` is guarded by lock `p % len`.
#[derive(Debug)]
pub struct LockPool {
	/// Locks
	locks: Box<[Mutex<()>]>,
}

impl LockPool {
	/// Creates a pool of `len` locks
	pub fn new(len: usize) -> Self {
		Self {
			locks: (0..len).map(|_| Mutex::new(())).collect(),
		}
	}

	/// Returns the number of locks
	pub fn len(&self) -> usize {
		self.locks.len()
	}

	/// Returns if there are no locks
	pub fn is_empty(&self) -> bool {
		self.locks.is_empty()
	}

	/// Returns the index of the lock guarding `position`
	///
	/// # Panics
	/// Panics if the pool is empty.
	pub fn lock_idx(&self, position: usize) -> usize {
		position % self.locks.len()
	}
}

impl Locking for LockPool {
	#[inline]
	fn with<R>(&self, position: usize, f: impl FnOnce() -> R) -> R {
		// Note: The lock guards no data, so a poisoned lock is still usable.
		let _guard = self.locks[self.lock_idx(position)]
			.lock()
			.unwrap_or_else(PoisonError::into_inner);
		f()
	}
}

/// Returns the message of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> &str {
	match payload.downcast_ref::<&str>() {
		Some(msg) => *msg,
		None => payload.downcast_ref::<String>().map_or("<unknown>", String::as_str),
	}
}
