
// Usage: 01_generator_output <host> <channel> <on|off> [waveform] [frequency_hz] [amplitude_vpp]
//
// Set TEKVXI_CONFIG to a JSON session config to override the defaults and
// RUST_LOG=debug to see every command that gets written.

use std::env;

use tekvxi::config::SessionConfig;
use tekvxi::devices::afg::{Afg, OutputSettings};
use tekvxi::vxi11::CoreClient;
use tekvxi::{Error, Result};

fn arg_f64(args:&[String], idx:usize) -> Result<Option<f64>> {
	match args.get(idx) {
		Some(s) => s.parse::<f64>().map(Some).map_err(|_| Error::Config(format!("'{}' is not a number", s))),
		None    => Ok(None),
	}
}

pub fn main() -> Result<()> {
	env_logger::init();

	let args:Vec<String> = env::args().collect();
	if args.len() < 4 {
		eprintln!("Usage: {} <host> <channel> <on|off> [waveform] [frequency_hz] [amplitude_vpp]", args[0]);
		std::process::exit(2);
	}

	let cfg = match env::var("TEKVXI_CONFIG") {
		Ok(path) => SessionConfig::from_file(path)?,
		Err(_)   => SessionConfig::default(),
	};

	let host:&str = &args[1];
	let channel:&str = &args[2];
	let status:bool = args[3].eq_ignore_ascii_case("on") || args[3] == "1";

	let mut settings = OutputSettings::new();
	if let Some(w) = args.get(4) { settings = settings.waveform(w); }
	settings.frequency = arg_f64(&args, 5)?;
	settings.amplitude = arg_f64(&args, 6)?;

	let core = CoreClient::open(host, &cfg)?;
	let mut gen = Afg::connect(core, cfg)?;

	let changes = gen.output(status, channel, &settings)?;
	eprintln!("{} command(s) written", changes.len());

	if let Some(states) = gen.config_output() {
		println!("{}", serde_json::to_string_pretty(states).map_err(|e| Error::Config(e.to_string()))?);
	}

	gen.into_transport().close()
}
