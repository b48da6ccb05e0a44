//! Memory-subsystem stress generator (`thrasher`)
//!
//! Drives concurrent sequential, random or pointer-chasing accesses over a large
//! memory region, to exercise caches, TLBs and memory bandwidth and latency.
//! Measuring any of it is left to external tools.

// Modules
pub mod arena;
pub mod config;
pub mod permutation;
pub mod pool;
pub mod thrasher;
pub mod traversal;

// Exports
pub use self::{
	arena::Arena,
	config::{Config, Iterations, Mode, RawConfig},
	permutation::Permutation,
	pool::{LockPool, WorkerPool},
	thrasher::Thrasher,
	traversal::{BlockGeometry, Traversal},
};
