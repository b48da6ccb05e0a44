//! Memory-subsystem stress generator (`thrasher`)

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	std::process::ExitCode,
	thrasher::{Config, RawConfig, Thrasher},
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
	// Read the config file, if any, and layer the arguments on top
	let file_config = match &args.config_file {
		Some(path) => RawConfig::from_json_file(path).with_context(|| format!("Unable to load config {path:?}"))?,
		None => RawConfig::default(),
	};
	let config = Config::from_raw(args.raw_config().merge(file_config))?;
	tracing::debug!(?config, "Validated config");

	// Then thrash
	let thrasher = Thrasher::new(config)?;
	let output = thrasher.run()?;
	tracing::debug!(total_visits = output.total_visits(), "Finished run");

	Ok(())
}
