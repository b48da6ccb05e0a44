//! Logger

// Imports
use {
	std::{fs, io, path::Path},
	tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter},
};

/// Initializes the global logger.
///
/// Logs to stderr, filtered by `RUST_LOG` (defaults to `info`).
/// If `log_file` is given, also logs to it, filtered by `RUST_LOG_FILE` (defaults to `debug`).
///
/// Any messages logged through [`pre_init`] are emitted afterwards.
///
/// # Panics
/// Panics if a global logger was already set.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	let term_layer = fmt::layer()
		.with_writer(io::stderr)
		.with_filter(self::env_filter("RUST_LOG", LevelFilter::INFO));

	// Note: If we can't open the log file, we still want to log to stderr,
	//       so we just warn about it once we're up.
	let file_layer = log_file.and_then(|path| {
		let file = fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.open(path);

		match file {
			Ok(file) => Some(
				fmt::layer()
					.with_ansi(false)
					.with_writer(std::sync::Mutex::new(file))
					.with_filter(self::env_filter("RUST_LOG_FILE", LevelFilter::DEBUG)),
			),
			Err(err) => {
				pre_init::warn(format!("Unable to open log file {path:?}: {err}"));
				None
			},
		}
	});

	tracing_subscriber::registry().with(term_layer).with(file_layer).init();

	pre_init::flush();
}

/// Creates an env filter from `var`, using `default` when it's unset
fn env_filter(var: &str, default: LevelFilter) -> EnvFilter {
	EnvFilter::builder()
		.with_default_directive(default.into())
		.with_env_var(var)
		.from_env_lossy()
}

/// Logging before the logger is initialized.
///
/// Messages are buffered and only emitted once [`init`](super::init) is called.
pub mod pre_init {
	// Imports
	use std::sync::{Mutex, PoisonError};

	/// Buffered messages
	static MESSAGES: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

	/// Message level
	#[derive(Clone, Copy, Debug)]
	enum Level {
		Debug,
		Warn,
	}

	/// Buffers a debug message
	pub fn debug(msg: impl Into<String>) {
		self::push(Level::Debug, msg.into());
	}

	/// Buffers a warning
	pub fn warn(msg: impl Into<String>) {
		self::push(Level::Warn, msg.into());
	}

	fn push(level: Level, msg: String) {
		MESSAGES
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push((level, msg));
	}

	/// Emits all buffered messages
	pub(super) fn flush() {
		let messages = std::mem::take(&mut *MESSAGES.lock().unwrap_or_else(PoisonError::into_inner));
		for (level, msg) in messages {
			match level {
				Level::Debug => tracing::debug!("{msg}"),
				Level::Warn => tracing::warn!("{msg}"),
			}
		}
	}
}
