
// Usage: 02_measure <host> <mode> <channel>...
//
// e.g. `02_measure 192.168.2.4 pk2pk 1 2` measures peak to peak on CH1 then CH2

use std::env;

use tekvxi::config::SessionConfig;
use tekvxi::devices::tds::Tds;
use tekvxi::vxi11::CoreClient;
use tekvxi::{Error, Result};

pub fn main() -> Result<()> {
	env_logger::init();

	let args:Vec<String> = env::args().collect();
	if args.len() < 4 {
		eprintln!("Usage: {} <host> <mode> <channel>...", args[0]);
		std::process::exit(2);
	}

	let cfg = match env::var("TEKVXI_CONFIG") {
		Ok(path) => SessionConfig::from_file(path)?,
		Err(_)   => SessionConfig::default(),
	};

	let core = CoreClient::open(&args[1], &cfg)?;
	let mut osci = Tds::connect(core, cfg)?;

	let channels:Vec<&str> = args[3..].iter().map(|s| s.as_str()).collect();
	let results = osci.measure(&args[2], &channels)?;

	println!("{}", serde_json::to_string_pretty(&results).map_err(|e| Error::Config(e.to_string()))?);

	osci.into_transport().close()
}
