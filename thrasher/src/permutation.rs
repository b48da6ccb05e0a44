//! Cyclic permutations
//!
//! Pointer-chasing runs walk a file of `u64` slots, where slot `i` holds the index
//! of the next slot to visit. For the walk to go through every slot, the permutation
//! must be a single cycle, with no fixed points or shorter sub-cycles.
//!
//! We build it with Sattolo's algorithm, which only ever produces single cycles.
//!
//! The file format is just the slots as native-endian `u64`s, with no header.

// Imports
use {
	anyhow::Context,
	byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt},
	rand::{RngCore, SeedableRng},
	rand_chacha::ChaCha8Rng,
	std::{
		fs,
		io::{self, BufReader, BufWriter, Write},
		path::Path,
	},
};

/// Size of each slot, in bytes
pub const SLOT_SIZE: usize = 8;

/// Default seed for generating permutations
pub const DEFAULT_SEED: u64 = 2021;

/// Permutation of slot indices
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Permutation {
	/// Slots
	slots: Vec<u64>,
}

impl Permutation {
	/// Generates a single-cycle permutation of `len` slots.
	pub fn generate(len: usize, seed: u64) -> Self {
		tracing::info!(len, "Filling slots");
		let mut slots = (0..len as u64).collect::<Vec<_>>();

		tracing::info!(seed, "Permuting slots with Sattolo's algorithm");
		let mut rng = ChaCha8Rng::seed_from_u64(seed);
		self::sattolo(&mut slots, &mut rng);

		Self { slots }
	}

	/// Generates a single-cycle permutation that occupies `byte_size` bytes.
	///
	/// # Errors
	/// Returns an error if `byte_size` isn't a positive multiple of [`SLOT_SIZE`].
	pub fn with_byte_size(byte_size: u64, seed: u64) -> Result<Self, anyhow::Error> {
		let len = self::slots_in(byte_size)?;
		Ok(Self::generate(len, seed))
	}

	/// Returns all slots
	pub fn slots(&self) -> &[u64] {
		&self.slots
	}

	/// Returns the number of slots
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Returns if there are no slots
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Returns the size of this permutation once written, in bytes
	pub fn byte_size(&self) -> usize {
		self.slots.len() * SLOT_SIZE
	}

	/// Returns the length of the cycle through slot 0.
	///
	/// See [`cycle_len`].
	pub fn cycle_len(&self) -> Option<usize> {
		self::cycle_len(&self.slots)
	}

	/// Returns if this permutation is a single cycle over all slots
	pub fn is_single_cycle(&self) -> bool {
		!self.is_empty() && self.cycle_len() == Some(self.len())
	}

	/// Writes all slots to `writer`
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		for &slot in &self.slots {
			writer
				.write_u64::<NativeEndian>(slot)
				.context("Unable to write slot")?;
		}

		Ok(())
	}

	/// Reads all slots from `reader`, until the end of the stream
	pub fn from_reader<R: io::Read + io::Seek>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let byte_size = reader
			.seek(io::SeekFrom::End(0))
			.context("Unable to get stream length")?;
		reader.rewind().context("Unable to rewind to start")?;

		let len = self::slots_in(byte_size)?;
		let mut slots = vec![0; len];
		reader
			.read_u64_into::<NativeEndian>(&mut slots)
			.context("Unable to read slots")?;

		Ok(Self { slots })
	}

	/// Writes this permutation to a file at `path`, replacing it if it exists
	pub fn write_file(&self, path: &Path) -> Result<(), anyhow::Error> {
		tracing::info!(?path, byte_size = self.byte_size(), "Writing permutation");

		let file = fs::File::create(path).context("Unable to create permutation file")?;
		let mut writer = BufWriter::new(file);
		self.to_writer(&mut writer)?;
		writer.flush().context("Unable to flush permutation file")?;

		Ok(())
	}

	/// Reads a permutation from a file at `path`
	pub fn read_file(path: &Path) -> Result<Self, anyhow::Error> {
		let file = fs::File::open(path).context("Unable to open permutation file")?;
		let mut reader = BufReader::new(file);
		Self::from_reader(&mut reader)
	}
}

/// Returns the number of slots in `byte_size` bytes.
///
/// # Errors
/// Returns an error if `byte_size` isn't a positive multiple of [`SLOT_SIZE`].
pub fn slots_in(byte_size: u64) -> Result<usize, anyhow::Error> {
	anyhow::ensure!(
		byte_size > 0 && byte_size % SLOT_SIZE as u64 == 0,
		"Permutation size must be a positive multiple of {SLOT_SIZE} bytes, found {byte_size}"
	);

	usize::try_from(byte_size / SLOT_SIZE as u64).context("Permutation size doesn't fit in memory")
}

/// Permutes `slots` into a single cycle using Sattolo's algorithm.
///
/// `slots` should start out as the identity (`slots[i] == i`).
pub fn sattolo<R: RngCore + ?Sized>(slots: &mut [u64], rng: &mut R) {
	let len = slots.len();
	for idx in 0..len.saturating_sub(1) {
		// Note: `other` is drawn from `(idx, len)`, never `idx` itself. Allowing `idx`
		//       (Fisher-Yates) could produce fixed points and sub-cycles.
		// Note: The modulo slightly favors smaller offsets as the range shrinks. We
		//       accept it to get away with a single raw draw per slot.
		let remaining = (len - (idx + 1)) as u64;
		let other = idx + 1 + (rng.next_u64() % remaining) as usize;
		slots.swap(idx, other);
	}
}

/// Returns the length of the cycle through slot 0.
///
/// Walks from slot 0 for at most `slots.len()` steps. Returns `None` if the walk
/// never returns to slot 0 in that time, or if it finds an out-of-range index.
///
/// Since the walk stops at the first return to slot 0, returning `Some(slots.len())`
/// means every slot was visited exactly once.
pub fn cycle_len(slots: &[u64]) -> Option<usize> {
	let mut cur = 0;
	for steps in 1..=slots.len() {
		cur = usize::try_from(*slots.get(cur)?).ok()?;
		if cur == 0 {
			return Some(steps);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use {super::*, proptest::prelude::*, std::io::Cursor};

	#[test]
	fn small_permutations_are_single_cycles() {
		for seed in 0..16 {
			let permutation = Permutation::generate(5, seed);
			assert_eq!(permutation.cycle_len(), Some(5), "seed {seed}: {permutation:?}");
		}

		let permutation = Permutation::generate(100, DEFAULT_SEED);
		assert_eq!(permutation.cycle_len(), Some(100));
		assert!(permutation.is_single_cycle());
	}

	#[test]
	fn no_fixed_points() {
		let permutation = Permutation::generate(1000, 7);
		for (idx, &next) in permutation.slots().iter().enumerate() {
			assert_ne!(idx as u64, next);
		}
	}

	#[test]
	fn single_slot_points_to_itself() {
		let permutation = Permutation::generate(1, DEFAULT_SEED);
		assert_eq!(permutation.slots(), &[0]);
		assert!(permutation.is_single_cycle());
	}

	#[test]
	fn same_seed_same_permutation() {
		assert_eq!(Permutation::generate(256, 3), Permutation::generate(256, 3));
		assert_ne!(Permutation::generate(256, 3), Permutation::generate(256, 4));
	}

	#[test]
	fn detects_sub_cycles() {
		assert_eq!(cycle_len(&[1, 0, 3, 2]), Some(2));
		assert_eq!(cycle_len(&[0, 2, 1]), Some(1));
		assert_eq!(cycle_len(&[1, 2, 1]), None);
		assert_eq!(cycle_len(&[5, 0]), None);
		assert_eq!(cycle_len(&[]), None);
		assert_eq!(cycle_len(&[2, 0, 1]), Some(3));
	}

	#[test]
	fn byte_size_must_be_slot_multiple() {
		assert!(Permutation::with_byte_size(0, DEFAULT_SEED).is_err());
		assert!(Permutation::with_byte_size(12, DEFAULT_SEED).is_err());

		let permutation = Permutation::with_byte_size(64, DEFAULT_SEED).expect("Valid size");
		assert_eq!(permutation.len(), 8);
		assert_eq!(permutation.byte_size(), 64);
	}

	#[test]
	fn file_format_is_raw_native_slots() {
		let permutation = Permutation::generate(10, DEFAULT_SEED);

		let mut bytes = Vec::new();
		permutation.to_writer(&mut bytes).expect("Unable to write");
		assert_eq!(bytes.len(), 10 * SLOT_SIZE);
		for (chunk, &slot) in bytes.chunks_exact(SLOT_SIZE).zip(permutation.slots()) {
			assert_eq!(chunk, slot.to_ne_bytes());
		}

		let read = Permutation::from_reader(&mut Cursor::new(bytes)).expect("Unable to read");
		assert_eq!(read, permutation);
	}

	#[test]
	fn reader_rejects_partial_slots() {
		let mut reader = Cursor::new(vec![0u8; 13]);
		assert!(Permutation::from_reader(&mut reader).is_err());
	}

	#[test]
	fn file_round_trip() {
		let dir = tempfile::tempdir().expect("Unable to create temporary directory");
		let path = dir.path().join("perm.bin");

		let permutation = Permutation::generate(4096, DEFAULT_SEED);
		permutation.write_file(&path).expect("Unable to write file");
		assert_eq!(fs::metadata(&path).expect("Unable to stat").len(), 4096 * 8);

		let read = Permutation::read_file(&path).expect("Unable to read file");
		assert!(read.is_single_cycle());
		assert_eq!(read, permutation);
	}

	proptest! {
		#[test]
		fn always_single_cycle(len in 2usize..512, seed: u64) {
			let permutation = Permutation::generate(len, seed);
			prop_assert_eq!(permutation.cycle_len(), Some(len));
		}
	}
}
