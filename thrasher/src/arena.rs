//! Arena
//!
//! The memory region that workers thrash.
//!
//! Workers access the arena concurrently and without any ordering between them,
//! so all accesses go through relaxed atomics. A relaxed load followed by a relaxed
//! store is not an atomic read-modify-write, so concurrent increments may be lost,
//! but that's the kind of contention we're after.

// Imports
use {
	crate::permutation::SLOT_SIZE,
	anyhow::Context,
	memmap2::{MmapMut, MmapOptions},
	std::{
		fs,
		path::{Path, PathBuf},
		slice,
		sync::atomic::{AtomicU64, AtomicU8},
	},
};

/// Arena
#[derive(Debug)]
pub struct Arena {
	/// Base address of `mmap`.
	///
	/// Obtained once from a mutable borrow, so that we never create
	/// references to the contents other than the atomic views.
	base: *mut u8,

	/// Length, in bytes
	len: usize,

	/// Mapping.
	///
	/// Unmapped on drop.
	_mmap: MmapMut,

	/// Backing
	backing: Backing,
}

// SAFETY: The arena's contents are only ever accessed through atomics,
//         and the mapping itself isn't tied to any thread.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
	/// Maps a private, zero-filled arena of `len` bytes.
	///
	/// # Errors
	/// Returns an error if `len` isn't a positive multiple of `block_size`,
	/// or if unable to map the memory.
	pub fn anonymous(len: usize, block_size: usize) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(len > 0, "Arena size must be non-zero");
		anyhow::ensure!(
			block_size > 0 && len % block_size == 0,
			"Arena size ({len}) must be a multiple of the block size ({block_size})"
		);

		let mmap = MmapMut::map_anon(len).context("Unable to map anonymous arena")?;
		tracing::debug!(len, "Mapped anonymous arena");

		Ok(Self::new(mmap, Backing::Anonymous))
	}

	/// Maps the file at `path` as a shared arena.
	///
	/// Writes to the arena are written back to the file.
	///
	/// # Errors
	/// Returns an error if unable to open, stat or map the file, or if its size
	/// isn't a positive multiple of the slot size.
	pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
		let file = fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)
			.with_context(|| format!("Unable to open arena file {path:?}"))?;
		let len = file
			.metadata()
			.with_context(|| format!("Unable to stat arena file {path:?}"))?
			.len();
		anyhow::ensure!(
			len > 0 && len % SLOT_SIZE as u64 == 0,
			"Arena file {path:?} size must be a positive multiple of {SLOT_SIZE} bytes, found {len}"
		);
		let len = usize::try_from(len).context("Arena file is too large to map")?;

		// SAFETY: The mapping is only accessed through atomics. Other processes
		//         modifying the file concurrently can only change the values we read.
		let mmap = unsafe { MmapOptions::new().len(len).map_mut(&file) }
			.with_context(|| format!("Unable to map arena file {path:?}"))?;
		tracing::debug!(?path, len, "Mapped arena file");

		Ok(Self::new(mmap, Backing::File {
			path: path.to_path_buf(),
			_file: file,
		}))
	}

	fn new(mut mmap: MmapMut, backing: Backing) -> Self {
		let base = mmap.as_mut_ptr();
		let len = mmap.len();

		// Note: Mappings are page-aligned, which the `u64` view relies on.
		debug_assert_eq!(base.align_offset(std::mem::align_of::<AtomicU64>()), 0);

		Self {
			base,
			len,
			_mmap: mmap,
			backing,
		}
	}

	/// Returns the base address
	pub fn base_address(&self) -> *mut u8 {
		self.base
	}

	/// Returns the length, in bytes
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns if this arena is empty.
	///
	/// Arenas are never empty, this only exists for completeness.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Returns the kind of this arena
	pub fn kind(&self) -> ArenaKind {
		match self.backing {
			Backing::Anonymous => ArenaKind::Anonymous,
			Backing::File { .. } => ArenaKind::File,
		}
	}

	/// Returns the backing file path, if any
	pub fn path(&self) -> Option<&Path> {
		match &self.backing {
			Backing::Anonymous => None,
			Backing::File { path, .. } => Some(path),
		}
	}

	/// Returns the arena as bytes
	pub fn bytes(&self) -> &[AtomicU8] {
		// SAFETY: `base` is valid for `len` bytes while the mapping lives, which
		//         outlives `self`. `AtomicU8` has the same layout as `u8`.
		unsafe { slice::from_raw_parts(self.base.cast_const().cast::<AtomicU8>(), self.len) }
	}

	/// Returns the arena as `u64` slots.
	///
	/// Any trailing bytes that don't make up a whole slot are excluded.
	pub fn cells(&self) -> &[AtomicU64] {
		// SAFETY: See `bytes`. `base` is page-aligned, so it is aligned for `AtomicU64`,
		//         and we round the length down to whole slots.
		unsafe { slice::from_raw_parts(self.base.cast_const().cast::<AtomicU64>(), self.len / SLOT_SIZE) }
	}
}

/// Arena kind
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ArenaKind {
	/// Anonymous, process-private memory
	Anonymous,

	/// Shared mapping of a file
	File,
}

/// Arena backing
#[derive(Debug)]
enum Backing {
	/// Anonymous
	Anonymous,

	/// File-backed
	File {
		/// Path
		path: PathBuf,

		/// File.
		///
		/// Kept open for as long as it's mapped, closed on drop
		_file: fs::File,
	},
}
