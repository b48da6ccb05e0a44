//! Traversal engine
//!
//! Each worker owns one [`Traversal`], which decides where the worker goes next.
//!
//! - [`Sequential`] walks blocks in order, wrapping around.
//! - [`Random`] picks blocks uniformly at random.
//! - [`PointerChase`] follows the cycle stored in the arena itself.

// Imports
use {
	crate::arena::Arena,
	rand::{Rng, SeedableRng},
	rand_chacha::ChaCha8Rng,
	std::{
		fmt,
		sync::atomic::{AtomicU64, AtomicU8, Ordering},
	},
};

/// Traversal over an arena
pub trait Traversal {
	/// Returns the current position.
	///
	/// This is a block index for block traversals and a cell index for pointer chasing.
	fn position(&self) -> usize;

	/// Accesses the current position, then moves on to the next one.
	fn visit(&mut self);
}

/// Block geometry.
///
/// Splits an arena into `n_blocks` blocks whose size is a power of two.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct BlockGeometry {
	/// Number of blocks
	n_blocks: usize,

	/// `log2` of the block size
	block_shift: u32,
}

impl BlockGeometry {
	/// Creates the geometry of an arena of `arena_size` bytes with blocks of `block_size` bytes.
	///
	/// # Errors
	/// Returns an error if either size is zero, if `arena_size` isn't a multiple of
	/// `block_size`, or if `block_size` isn't a power of two.
	pub fn new(arena_size: usize, block_size: usize) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(arena_size > 0, "Arena size must be non-zero");
		anyhow::ensure!(block_size > 0, "Block size must be non-zero");
		anyhow::ensure!(
			arena_size % block_size == 0,
			"Arena size ({arena_size}) must be a perfect multiple of block size ({block_size})"
		);
		anyhow::ensure!(
			block_size.is_power_of_two(),
			"Block size ({block_size}) must be a power of two"
		);

		Ok(Self {
			n_blocks:    arena_size / block_size,
			block_shift: block_size.trailing_zeros(),
		})
	}

	/// Returns the number of blocks
	pub fn n_blocks(&self) -> usize {
		self.n_blocks
	}

	/// Returns the block size, in bytes
	pub fn block_size(&self) -> usize {
		1 << self.block_shift
	}

	/// Returns `log2` of the block size
	pub fn block_shift(&self) -> u32 {
		self.block_shift
	}

	/// Returns the arena size, in bytes
	pub fn arena_size(&self) -> usize {
		self.n_blocks << self.block_shift
	}

	/// Returns the byte offset of block `block_idx` from the start of the arena
	#[inline]
	pub fn offset(&self, block_idx: usize) -> usize {
		block_idx << self.block_shift
	}

	/// Returns the block worker `thread_idx` (out of `n_threads`) starts at.
	///
	/// Workers start evenly spread through the arena.
	pub fn start_block(&self, thread_idx: usize, n_threads: usize) -> usize {
		(self.n_blocks / n_threads) * thread_idx
	}
}

/// Arena split into blocks
#[derive(Clone, Copy)]
pub struct Blocks<'a> {
	/// Arena bytes
	bytes: &'a [AtomicU8],

	/// Geometry
	geometry: BlockGeometry,
}

impl<'a> Blocks<'a> {
	/// Splits `arena` into blocks
	///
	/// # Errors
	/// Returns an error if `geometry` doesn't cover exactly the whole arena.
	pub fn new(arena: &'a Arena, geometry: BlockGeometry) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(
			geometry.arena_size() == arena.len(),
			"Block geometry covers {} bytes, but the arena has {}",
			geometry.arena_size(),
			arena.len()
		);

		Ok(Self {
			bytes: arena.bytes(),
			geometry,
		})
	}

	/// Returns the geometry
	pub fn geometry(&self) -> BlockGeometry {
		self.geometry
	}

	/// Touches block `block_idx`.
	///
	/// Reads the first byte of the block and writes it back incremented, forcing
	/// both a load and a store for each visited block.
	///
	/// # Panics
	/// Panics if `block_idx` is out of bounds.
	#[inline]
	pub fn touch(&self, block_idx: usize) {
		let byte = &self.bytes[self.geometry.offset(block_idx)];
		byte.store(byte.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
	}
}

impl fmt::Debug for Blocks<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Blocks")
			.field("geometry", &self.geometry)
			.finish_non_exhaustive()
	}
}

/// Sequential traversal
#[derive(Clone, Debug)]
pub struct Sequential<'a> {
	/// Blocks
	blocks: Blocks<'a>,

	/// Current block
	block_idx: usize,
}

impl<'a> Sequential<'a> {
	/// Creates a sequential traversal starting at `start_block`
	pub fn new(blocks: Blocks<'a>, start_block: usize) -> Self {
		Self {
			blocks,
			block_idx: start_block % blocks.geometry.n_blocks,
		}
	}
}

impl Traversal for Sequential<'_> {
	fn position(&self) -> usize {
		self.block_idx
	}

	#[inline]
	fn visit(&mut self) {
		self.blocks.touch(self.block_idx);
		self.block_idx = (self.block_idx + 1) % self.blocks.geometry.n_blocks;
	}
}

/// Random traversal.
///
/// After the starting block, every block is drawn uniformly from the whole arena.
#[derive(Clone, Debug)]
pub struct Random<'a> {
	/// Blocks
	blocks: Blocks<'a>,

	/// Current block
	block_idx: usize,

	/// Generator
	rng: ChaCha8Rng,
}

impl<'a> Random<'a> {
	/// Creates a random traversal starting at `start_block`.
	///
	/// The same `seed` always yields the same sequence of blocks.
	pub fn new(blocks: Blocks<'a>, start_block: usize, seed: u64) -> Self {
		Self {
			blocks,
			block_idx: start_block % blocks.geometry.n_blocks,
			rng: ChaCha8Rng::seed_from_u64(seed),
		}
	}
}

impl Traversal for Random<'_> {
	fn position(&self) -> usize {
		self.block_idx
	}

	#[inline]
	fn visit(&mut self) {
		self.blocks.touch(self.block_idx);
		self.block_idx = self.rng.gen_range(0..self.blocks.geometry.n_blocks);
	}
}

/// Pointer-chasing traversal.
///
/// Each cell holds the index of the next cell to visit. Cells are only read,
/// since writing to them would break the cycle.
#[derive(Clone)]
pub struct PointerChase<'a> {
	/// Cells
	cells: &'a [AtomicU64],

	/// Current cell
	cell_idx: usize,
}

impl<'a> PointerChase<'a> {
	/// Creates a pointer-chasing traversal starting at cell `start_cell`.
	///
	/// Wraps `start_cell` if it's past the last cell.
	///
	/// # Errors
	/// Returns an error if there are no cells.
	pub fn new(cells: &'a [AtomicU64], start_cell: usize) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(!cells.is_empty(), "Cannot chase pointers without any cells");

		Ok(Self {
			cells,
			cell_idx: start_cell % cells.len(),
		})
	}
}

impl fmt::Debug for PointerChase<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PointerChase")
			.field("n_cells", &self.cells.len())
			.field("cell_idx", &self.cell_idx)
			.finish()
	}
}

impl Traversal for PointerChase<'_> {
	fn position(&self) -> usize {
		self.cell_idx
	}

	/// # Panics
	/// Panics if the current cell points outside of the arena.
	#[inline]
	fn visit(&mut self) {
		// Note: Indices that don't fit in `usize` also can't be in bounds.
		let next = self.cells[self.cell_idx].load(Ordering::Relaxed);
		self.cell_idx = usize::try_from(next).unwrap_or(usize::MAX);
		assert!(
			self.cell_idx < self.cells.len(),
			"Cell points outside of the arena: {next}"
		);
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::permutation::{Permutation, DEFAULT_SEED},
		std::collections::HashSet,
	};

	/// Collects the positions of the next `count` visits
	fn positions<T: Traversal>(traversal: &mut T, count: usize) -> Vec<usize> {
		(0..count)
			.map(|_| {
				let position = traversal.position();
				traversal.visit();
				position
			})
			.collect()
	}

	/// Creates an anonymous arena holding `permutation`
	fn permutation_arena(permutation: &Permutation) -> Arena {
		let arena = Arena::anonymous(permutation.byte_size(), 8).expect("Unable to map arena");
		for (cell, &slot) in arena.cells().iter().zip(permutation.slots()) {
			cell.store(slot, Ordering::Relaxed);
		}

		arena
	}

	#[test]
	fn offset_is_shifted_index() {
		let geometry = BlockGeometry::new(64 * 4096, 4096).expect("Valid geometry");
		assert_eq!(geometry.block_shift(), 12);
		assert_eq!(geometry.block_size(), 4096);
		assert_eq!(geometry.n_blocks(), 64);
		assert_eq!(geometry.offset(7), 28672);
		assert_eq!(geometry.offset(7), 7 * 4096);
	}

	#[test]
	fn geometry_rejects_bad_sizes() {
		assert!(BlockGeometry::new(4096, 100).is_err());
		assert!(BlockGeometry::new(1000, 128).is_err());
		assert!(BlockGeometry::new(0, 128).is_err());
		assert!(BlockGeometry::new(4096, 0).is_err());
		assert!(BlockGeometry::new(4096, 4096).is_ok());
	}

	#[test]
	fn start_blocks_are_spread() {
		let geometry = BlockGeometry::new(16 * 64, 64).expect("Valid geometry");
		let starts = (0..4).map(|thread_idx| geometry.start_block(thread_idx, 4)).collect::<Vec<_>>();
		assert_eq!(starts, [0, 4, 8, 12]);

		// More threads than blocks all start at the beginning
		assert_eq!(geometry.start_block(5, 32), 0);
	}

	#[test]
	fn blocks_must_cover_arena() {
		let arena = Arena::anonymous(4096, 64).expect("Unable to map arena");
		let geometry = BlockGeometry::new(8192, 64).expect("Valid geometry");
		assert!(Blocks::new(&arena, geometry).is_err());
	}

	#[test]
	fn sequential_visits_every_block_once() {
		let geometry = BlockGeometry::new(16 * 64, 64).expect("Valid geometry");
		let arena = Arena::anonymous(geometry.arena_size(), geometry.block_size()).expect("Unable to map arena");
		let blocks = Blocks::new(&arena, geometry).expect("Geometry matches arena");

		let mut traversal = Sequential::new(blocks, geometry.start_block(0, 1));
		let visited = self::positions(&mut traversal, geometry.n_blocks());
		assert_eq!(visited, (0..16).collect::<Vec<_>>());
		assert_eq!(traversal.position(), 0);

		for (offset, byte) in arena.bytes().iter().enumerate() {
			let expected = u8::from(offset % 64 == 0);
			assert_eq!(byte.load(Ordering::Relaxed), expected, "Byte {offset}");
		}
	}

	#[test]
	fn sequential_wraps_around() {
		let geometry = BlockGeometry::new(16 * 64, 64).expect("Valid geometry");
		let arena = Arena::anonymous(geometry.arena_size(), geometry.block_size()).expect("Unable to map arena");
		let blocks = Blocks::new(&arena, geometry).expect("Geometry matches arena");

		let mut traversal = Sequential::new(blocks, 14);
		assert_eq!(self::positions(&mut traversal, 4), [14, 15, 0, 1]);
	}

	#[test]
	fn touches_wrap_around() {
		let geometry = BlockGeometry::new(64, 64).expect("Valid geometry");
		let arena = Arena::anonymous(geometry.arena_size(), geometry.block_size()).expect("Unable to map arena");
		let blocks = Blocks::new(&arena, geometry).expect("Geometry matches arena");

		for _ in 0..300 {
			blocks.touch(0);
		}
		assert_eq!(arena.bytes()[0].load(Ordering::Relaxed), (300 % 256) as u8);
	}

	#[test]
	fn random_is_deterministic_per_seed() {
		let geometry = BlockGeometry::new(1024 * 64, 64).expect("Valid geometry");
		let arena = Arena::anonymous(geometry.arena_size(), geometry.block_size()).expect("Unable to map arena");
		let blocks = Blocks::new(&arena, geometry).expect("Geometry matches arena");

		let start = geometry.start_block(2, 4);
		let first = self::positions(&mut Random::new(blocks, start, 2), 1000);
		let second = self::positions(&mut Random::new(blocks, start, 2), 1000);
		assert_eq!(first, second);
		assert_eq!(first[0], 512);
		assert!(first.iter().all(|&block_idx| block_idx < geometry.n_blocks()));

		let other = self::positions(&mut Random::new(blocks, start, 3), 1000);
		assert_ne!(first, other);
	}

	#[test]
	fn pointer_chase_follows_cycle() {
		let permutation = Permutation::generate(257, DEFAULT_SEED);
		let arena = self::permutation_arena(&permutation);

		let mut traversal = PointerChase::new(arena.cells(), 0).expect("Arena has cells");
		let visited = self::positions(&mut traversal, permutation.len());
		assert_eq!(visited.iter().copied().collect::<HashSet<_>>().len(), permutation.len());
		assert_eq!(traversal.position(), 0);

		// Chasing only reads
		let cells = arena.cells().iter().map(|cell| cell.load(Ordering::Relaxed)).collect::<Vec<_>>();
		assert_eq!(cells, permutation.slots());
	}

	#[test]
	fn pointer_chase_starts_at_thread_cell() {
		let permutation = Permutation::generate(8, DEFAULT_SEED);
		let arena = self::permutation_arena(&permutation);

		let mut traversal = PointerChase::new(arena.cells(), 3).expect("Arena has cells");
		assert_eq!(traversal.position(), 3);
		traversal.visit();
		assert_eq!(traversal.position() as u64, permutation.slots()[3]);

		let traversal = PointerChase::new(arena.cells(), 11).expect("Arena has cells");
		assert_eq!(traversal.position(), 3);

		assert!(PointerChase::new(&[], 0).is_err());
	}

	#[test]
	#[should_panic = "Cell points outside of the arena"]
	fn pointer_chase_rejects_out_of_range_cells() {
		let arena = Arena::anonymous(16, 8).expect("Unable to map arena");
		arena.cells()[0].store(2, Ordering::Relaxed);

		let mut traversal = PointerChase::new(arena.cells(), 0).expect("Arena has cells");
		traversal.visit();
	}
}
