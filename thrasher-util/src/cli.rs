//! Command line parsing

// Imports
use {clap::Parser, std::ffi::OsString};

/// Parses the process' arguments into `A`.
///
/// Help and version requests are printed and exit the process.
/// Any other error is returned as a single line.
pub fn parse_args<A: Parser>() -> Result<A, String> {
	self::parse_args_from(std::env::args_os())
}

/// Parses `args` into `A`.
///
/// See [`parse_args`].
pub fn parse_args_from<A, I, T>(args: I) -> Result<A, String>
where
	A: Parser,
	I: IntoIterator<Item = T>,
	T: Into<OsString> + Clone,
{
	match A::try_parse_from(args) {
		Ok(args) => Ok(args),
		Err(err) if !err.use_stderr() => err.exit(),
		Err(err) => Err(self::error_message(&err)),
	}
}

/// Returns the first paragraph of `err` as a single line, without clap's `error: ` prefix
#[must_use]
pub fn error_message(err: &clap::Error) -> String {
	let rendered = err.render().to_string();
	let msg = rendered
		.lines()
		.map(str::trim)
		.take_while(|line| !line.is_empty())
		.collect::<Vec<_>>()
		.join(" ");
	msg.strip_prefix("error:").unwrap_or(&msg).trim().to_owned()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	#[derive(clap::Parser)]
	struct Args {
		#[clap(short = 't')]
		threads: usize,

		#[clap(short = 'm', value_parser = ["sequential", "random"])]
		mode: Option<String>,
	}

	#[test]
	fn parses_valid_args() {
		let args = parse_args_from::<Args, _, _>(["test", "-t", "4"]).expect("Valid arguments");
		assert_eq!(args.threads, 4);
		assert_eq!(args.mode, None);
	}

	#[test]
	fn errors_are_a_single_line() {
		let invalid: [&[&str]; 4] = [
			&["test", "-t", "many"],
			&["test", "-t", "1", "-m", "strided"],
			&["test"],
			&["test", "-t", "1", "--unknown"],
		];
		for argv in invalid {
			let err = parse_args_from::<Args, _, _>(argv.iter().copied()).expect_err("Invalid arguments");
			assert!(!err.is_empty(), "Empty error for {argv:?}");
			assert!(!err.contains('\n'), "Multi-line error for {argv:?}: {err:?}");
			assert!(!err.starts_with("error"), "Prefixed error for {argv:?}: {err:?}");
		}
	}

	#[test]
	fn invalid_value_names_the_value() {
		let err = parse_args_from::<Args, _, _>(["test", "-t", "1", "-m", "strided"]).expect_err("Invalid mode");
		assert!(err.contains("'strided'"), "Unexpected error: {err:?}");
	}

	#[test]
	fn missing_argument_is_named() {
		let err = parse_args_from::<Args, _, _>(["test"]).expect_err("Missing threads");
		assert!(err.contains("-t"), "Unexpected error: {err:?}");
	}
}
