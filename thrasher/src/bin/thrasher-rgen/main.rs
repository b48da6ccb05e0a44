//! Permutation generator for `thrasher`'s pointer-chasing mode

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	std::process::ExitCode,
	thrasher::Permutation,
	thrasher_util::{cli, logger},
};

fn main() -> ExitCode {
	// Get arguments
	let args = match cli::parse_args::<Args>() {
		Ok(args) => args,
		Err(err) => {
			eprintln!("ERROR: {err}");
			return ExitCode::FAILURE;
		},
	};
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	match self::run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("ERROR: {err:#}");
			ExitCode::FAILURE
		},
	}
}

fn run(args: &Args) -> Result<(), anyhow::Error> {
	// Note: The size is validated before generating anything
	let permutation = Permutation::with_byte_size(args.size, args.seed)?;
	permutation
		.write_file(&args.output_file)
		.with_context(|| format!("Unable to write permutation to {:?}", args.output_file))?;

	if args.verify {
		let written = Permutation::read_file(&args.output_file).context("Unable to read back permutation")?;
		anyhow::ensure!(
			written.is_single_cycle(),
			"Written permutation isn't a single cycle"
		);
		tracing::info!("Verified permutation is a single cycle");
	}

	tracing::info!("Done");
	Ok(())
}
