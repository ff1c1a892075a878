
// Usage: 03_spectrum <scope host> [generator host] [frequency_hz]
//
// Transfers CH1 and CH2 from the scope and prints the strongest Fourier
// component of each. With a generator host, CH1 of the generator is first set
// to a 1 Vpp sine at the given frequency (1 kHz by default).

use std::env;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use tekvxi::analysis::{self, FourierPeak};
use tekvxi::config::SessionConfig;
use tekvxi::devices::afg::{Afg, OutputSettings};
use tekvxi::devices::tds::Tds;
use tekvxi::tokens::ChannelId;
use tekvxi::vxi11::CoreClient;
use tekvxi::{Error, Result};

const SETTLE_SEC:f32 = 2.0;

#[derive(Debug, Serialize)]
struct Row {
	channel: ChannelId,
	points: usize,
	sample_rate: f64,
	peak: Option<FourierPeak>,
}

pub fn main() -> Result<()> {
	env_logger::init();

	let args:Vec<String> = env::args().collect();
	if args.len() < 2 {
		eprintln!("Usage: {} <scope host> [generator host] [frequency_hz]", args[0]);
		std::process::exit(2);
	}
	let cfg = SessionConfig::default();

	let mut gen = match args.get(2) {
		Some(host) => {
			let freq:f64 = match args.get(3) {
				Some(s) => s.parse().map_err(|_| Error::Config(format!("'{}' is not a number", s)))?,
				None    => 1e3,
			};
			let mut gen = Afg::connect(CoreClient::open(host, &cfg)?, cfg.clone())?;
			gen.output(true, 1, &OutputSettings::new().waveform("sin").frequency(freq).amplitude(1.0))?;
			thread::sleep(Duration::from_secs_f32(SETTLE_SEC));
			Some(gen)
		},
		None => None,
	};

	let mut osci = Tds::connect(CoreClient::open(&args[1], &cfg)?, cfg)?;
	let screen = osci.screen(&[1, 2])?;

	let rows:Vec<Row> = screen.traces.iter().map(|t| Row {
		channel: t.channel,
		points: t.len(),
		sample_rate: t.sample_rate(),
		peak: analysis::trace_peak(t),
	}).collect();
	println!("{}", serde_json::to_string_pretty(&rows).map_err(|e| Error::Config(e.to_string()))?);

	if let Some(gen) = gen.as_mut() {
		gen.output(false, 1, &OutputSettings::new())?;
	}

	Ok(())
}
