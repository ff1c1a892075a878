//! Tektronix AFG3000 series function generators.
//!
//! [`Afg::output`] turns a channel on or off and, on the way, moves the channel
//! from its cached configuration to the requested one with as few commands as
//! possible. Only the fields present in [`OutputSettings`] are touched and
//! only when they differ from the cache; the output state is always written
//! last.
//!
//! ```no_run
//! use tekvxi::config::SessionConfig;
//! use tekvxi::devices::afg::{Afg, OutputSettings};
//! use tekvxi::vxi11::CoreClient;
//!
//! # fn main() -> tekvxi::Result<()> {
//! let cfg = SessionConfig::default();
//! let mut gen = Afg::connect(CoreClient::open("192.168.2.3", &cfg)?, cfg)?;
//! gen.output(true, 1, &OutputSettings::new().waveform("squ75").frequency(1e3))?;
//! gen.output(false, 1, &OutputSettings::new())?;
//! # Ok(())
//! # }
//! ```

use log::{debug, info};
use serde::{Serialize, Deserialize};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::tokens::{self, is_percentage, ChannelId, ChannelRef, Shape, Waveform, DEFAULT_PERCENTAGE};
use crate::transport::Transport;

use super::{approx_eq, identify, query_bool, query_number, Identity};

pub const MODEL_FAMILIES:&[&str] = &["AFG3"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputChannelState {
	pub status: bool,
	pub shape: Shape,
	/// Only meaningful while the shape is PULS. Kept when switching away.
	pub duty_cycle: f64,
	/// Only meaningful while the shape is RAMP. Kept when switching away.
	pub ramp_symmetry: f64,
	pub frequency: f64,
	pub amplitude: f64,
	pub offset: f64,
	pub phase: f64,
}

impl Default for OutputChannelState {

	// Instrument power-on defaults
	fn default() -> Self {
		Self {
			status: false,
			shape: Shape::Sin,
			duty_cycle: DEFAULT_PERCENTAGE,
			ramp_symmetry: DEFAULT_PERCENTAGE,
			frequency: 1e3,
			amplitude: 1.0,
			offset: 0.0,
			phase: 0.0,
		}
	}

}

/// Requested configuration. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
	pub waveform: Option<Waveform>,
	/// Hz
	pub frequency: Option<f64>,
	/// Vpp
	pub amplitude: Option<f64>,
	/// V
	pub offset: Option<f64>,
	/// Written verbatim to SOUR:PHAS
	pub phase: Option<f64>,
}

impl OutputSettings {

	pub fn new() -> Self { Self::default() }

	/// Free-form waveform such as `"sin"`, `"squ75"` or `"ram0"`
	pub fn waveform(mut self, descr:&str) -> Self {
		self.waveform = Some(tokens::normalize_waveform(descr).into_value());
		self
	}

	pub fn exact_waveform(mut self, w:Waveform) -> Self {
		self.waveform = Some(w);
		self
	}

	pub fn frequency(mut self, hz:f64) -> Self { self.frequency = Some(hz); self }
	pub fn amplitude(mut self, vpp:f64) -> Self { self.amplitude = Some(vpp); self }
	pub fn offset(mut self, v:f64) -> Self { self.offset = Some(v); self }
	pub fn phase(mut self, phase:f64) -> Self { self.phase = Some(phase); self }

	/// Frequency and amplitude must be positive, percentages within [0, 100]
	/// and everything finite
	pub fn validate(&self) -> Result<()> {
		let bad = |field:&'static str, value:f64| Err(Error::InvalidSetting{ field, value });

		match self.waveform {
			Some(Waveform::Square(d)) if !is_percentage(d) => return bad("duty cycle", d),
			Some(Waveform::Ramp(s)) if !is_percentage(s)   => return bad("ramp symmetry", s),
			_ => {},
		}

		let checks:[(&'static str, Option<f64>, bool); 4] = [
			("frequency", self.frequency, true),
			("amplitude", self.amplitude, true),
			("offset",    self.offset,    false),
			("phase",     self.phase,     false),
		];
		for (field, value, positive) in checks.iter() {
			if let Some(x) = value {
				if !x.is_finite() || (*positive && *x <= 0.0) {
					return bad(*field, *x);
				}
			}
		}
		Ok(())
	}

}

/// One register write
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
	Shape(Shape),
	DutyCycle(f64),
	RampSymmetry(f64),
	Frequency(f64),
	Amplitude(f64),
	Offset(f64),
	Phase(f64),
	Status(bool),
}

impl Change {

	pub fn command(&self, ch:u32) -> String {
		match self {
			Change::Shape(s)        => format!("SOUR{}:FUNC:SHAP {}", ch, s.token()),
			Change::DutyCycle(d)    => format!("SOUR{}:PULS:DCYC {:.1}", ch, d),
			Change::RampSymmetry(s) => format!("SOUR{}:FUNC:RAMP:SYMM {:.1}", ch, s),
			Change::Frequency(f)    => format!("SOUR{}:FREQ {}", ch, f),
			Change::Amplitude(a)    => format!("SOUR{}:VOLT:LEV:IMM:AMPL {}", ch, a),
			Change::Offset(o)       => format!("SOUR{}:VOLT:LEV:IMM:OFFS {}", ch, o),
			Change::Phase(p)        => format!("SOUR{}:PHAS {}", ch, p),
			Change::Status(on)      => format!("OUTP{}:STAT {}", ch, if *on {1} else {0}),
		}
	}

	/// Record the write in the cache, assuming the instrument took it
	pub fn apply(&self, state:&mut OutputChannelState) {
		match self {
			Change::Shape(s)        => state.shape = s.clone(),
			Change::DutyCycle(d)    => state.duty_cycle = *d,
			Change::RampSymmetry(s) => state.ramp_symmetry = *s,
			Change::Frequency(f)    => state.frequency = *f,
			Change::Amplitude(a)    => state.amplitude = *a,
			Change::Offset(o)       => state.offset = *o,
			Change::Phase(p)        => state.phase = *p,
			Change::Status(on)      => state.status = *on,
		}
	}

}

/// Ordered writes that take `cached` to `desired`, ending with the output state.
///
/// Secondary waveform parameters are compared only when the requested waveform
/// uses them. Leaving a square or ramp wave does not reset its parameter, so a
/// later request for the same parameter value may be skipped against the
/// stale cached value.
pub fn plan_output(status:bool, cached:&OutputChannelState, desired:&OutputSettings, rel_tol:f64) -> Vec<Change> {
	let mut plan:Vec<Change> = vec![];

	if let Some(w) = desired.waveform {
		let shape = w.shape();
		if cached.shape != shape {
			plan.push(Change::Shape(shape));
		}
		match w {
			Waveform::Square(d) if !approx_eq(cached.duty_cycle, d, rel_tol)  => plan.push(Change::DutyCycle(d)),
			Waveform::Ramp(s) if !approx_eq(cached.ramp_symmetry, s, rel_tol) => plan.push(Change::RampSymmetry(s)),
			_ => {},
		}
	}

	let numeric:[(Option<f64>, f64, fn(f64) -> Change); 4] = [
		(desired.frequency, cached.frequency, Change::Frequency),
		(desired.amplitude, cached.amplitude, Change::Amplitude),
		(desired.offset,    cached.offset,    Change::Offset),
		(desired.phase,     cached.phase,     Change::Phase),
	];
	for (want, have, change) in numeric.iter() {
		if let Some(x) = want {
			if !approx_eq(*have, *x, rel_tol) {
				plan.push(change(*x));
			}
		}
	}

	plan.push(Change::Status(status));
	plan
}

pub struct Afg<T: Transport> {
	transport: T,
	cfg: SessionConfig,
	identity: Identity,
	cache: Option<Vec<OutputChannelState>>,
}

impl<T: Transport> Afg<T> {

	/// Identify the instrument and read the configuration of every channel
	pub fn connect(mut transport:T, cfg:SessionConfig) -> Result<Self> {
		let identity = identify(&mut transport, MODEL_FAMILIES)?;
		let mut gen = Self{ transport, cfg, identity, cache: None };
		gen.resync()?;
		Ok(gen)
	}

	pub fn identity(&self) -> &Identity { &self.identity }

	pub fn channels(&self) -> u32 { self.cfg.channels }

	/// Cached configuration of every channel, `None` after a failure until the
	/// next resync
	pub fn config_output(&self) -> Option<&[OutputChannelState]> { self.cache.as_deref() }

	pub fn channel_state(&self, ch:u32) -> Option<&OutputChannelState> {
		self.cache.as_ref().and_then(|c| c.get((ch as usize).wrapping_sub(1)))
	}

	/// Forget the cached configuration; the next output call reads it back
	pub fn invalidate(&mut self) { self.cache = None; }

	pub fn transport(&self) -> &T { &self.transport }
	pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }
	pub fn into_transport(self) -> T { self.transport }

	fn output_channel<'a, C: Into<ChannelRef<'a>>>(&self, channel:C) -> Result<u32> {
		let channel = channel.into();
		match tokens::normalize_channel(channel, self.cfg.channels)? {
			ChannelId::Analog(n) => Ok(n),
			ChannelId::Math      => Err(Error::InvalidChannel(format!("{:?} is not an output channel", channel))),
		}
	}

	/// Query the instrument for one channel's configuration
	pub fn read_channel_state(&mut self, ch:u32) -> Result<OutputChannelState> {
		let ch = self.output_channel(ch)?;
		let t = &mut self.transport;

		let status = query_bool(t, &format!("OUTP{}:STAT?", ch))?;
		let shape = Shape::from_reply(&t.query(&format!("SOUR{}:FUNC:SHAP?", ch))?);

		// The secondary parameters are only read for the shape that uses them
		let ramp_symmetry = if shape == Shape::Ramp {
			query_number(t, &format!("SOUR{}:FUNC:RAMP:SYMM?", ch))?
		} else { DEFAULT_PERCENTAGE };
		let duty_cycle = if shape == Shape::Puls {
			query_number(t, &format!("SOUR{}:PULS:DCYC?", ch))?
		} else { DEFAULT_PERCENTAGE };

		let frequency = query_number(t, &format!("SOUR{}:FREQ?", ch))?;
		let amplitude = query_number(t, &format!("SOUR{}:VOLT:LEV:IMM:AMPL?", ch))?;
		let offset    = query_number(t, &format!("SOUR{}:VOLT:LEV:IMM:OFFS?", ch))?;
		let phase     = query_number(t, &format!("SOUR{}:PHAS?", ch))?;

		Ok(OutputChannelState{ status, shape, duty_cycle, ramp_symmetry, frequency, amplitude, offset, phase })
	}

	/// Rebuild the cache from the instrument
	pub fn resync(&mut self) -> Result<&[OutputChannelState]> {
		self.cache = None;
		let mut states = Vec::with_capacity(self.cfg.channels as usize);
		for ch in 1..=self.cfg.channels {
			states.push(self.read_channel_state(ch)?);
		}
		debug!("Generator configuration read back: {:?}", states);
		Ok(self.cache.get_or_insert(states).as_slice())
	}

	/// Turn a channel on or off, reconfiguring whatever `settings` asks for.
	///
	/// Returns the changes that were written. Bad channels and settings are
	/// rejected before anything is sent. A transport failure is returned as is
	/// and clears the cache, since the failed write may or may not have reached
	/// the instrument.
	pub fn output<'a, C: Into<ChannelRef<'a>>>(&mut self, status:bool, channel:C, settings:&OutputSettings) -> Result<Vec<Change>> {
		let ch = self.output_channel(channel)?;
		settings.validate()?;
		let idx = (ch - 1) as usize;

		if self.cache.is_none() {
			self.resync()?;
		}
		let plan = match self.cache.as_ref() {
			Some(states) => plan_output(status, &states[idx], settings, self.cfg.float_tolerance),
			None => return Err(Error::comm("Generator configuration unavailable")),
		};

		for change in &plan {
			let cmd = change.command(ch);
			debug!("CH{}: {:?} ({})", ch, change, cmd);
			if let Err(e) = self.transport.write(&cmd) {
				self.cache = None;
				return Err(e);
			}
			if let Some(states) = self.cache.as_mut() {
				change.apply(&mut states[idx]);
			}
		}

		info!("Output CH{} {}", ch, if status {"ON"} else {"OFF"});
		Ok(plan)
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	fn sine_1k() -> OutputChannelState { OutputChannelState::default() }

	#[test]
	fn nothing_to_do_but_status() {
		let want = OutputSettings::new().exact_waveform(Waveform::Sine).frequency(1e3).amplitude(1.0).offset(0.0).phase(0.0);
		assert_eq!(plan_output(true, &sine_1k(), &want, 0.0), vec![Change::Status(true)]);
	}

	#[test]
	fn only_frequency() {
		let plan = plan_output(true, &sine_1k(), &OutputSettings::new().frequency(2e3), 0.0);
		assert_eq!(plan, vec![Change::Frequency(2e3), Change::Status(true)]);
	}

	#[test]
	fn field_order() {
		let want = OutputSettings::new().phase(0.5).offset(0.1).amplitude(2.0).frequency(5e3).exact_waveform(Waveform::Ramp(10.0));
		let plan = plan_output(false, &sine_1k(), &want, 0.0);
		assert_eq!(plan, vec![
			Change::Shape(Shape::Ramp), Change::RampSymmetry(10.0), Change::Frequency(5e3),
			Change::Amplitude(2.0), Change::Offset(0.1), Change::Phase(0.5), Change::Status(false),
		]);
	}

	#[test]
	fn square_at_fifty_is_squ() {
		let plan = plan_output(true, &sine_1k(), &OutputSettings::new().waveform("squ"), 0.0);
		assert_eq!(plan, vec![Change::Shape(Shape::Squ), Change::Status(true)]);

		let plan = plan_output(true, &sine_1k(), &OutputSettings::new().waveform("squ75"), 0.0);
		assert_eq!(plan, vec![Change::Shape(Shape::Puls), Change::DutyCycle(75.0), Change::Status(true)]);
	}

	#[test]
	fn tolerance_absorbs_rounding() {
		let mut cached = sine_1k();
		cached.amplitude = 0.1 + 0.2;
		let want = OutputSettings::new().amplitude(0.3);
		assert_eq!(plan_output(true, &cached, &want, 0.0).len(), 2);
		assert_eq!(plan_output(true, &cached, &want, 1e-9).len(), 1);
	}

	#[test]
	fn settings_ranges() {
		assert!(OutputSettings::new().frequency(1e3).amplitude(0.5).offset(-1.0).phase(-0.5).validate().is_ok());
		assert!(OutputSettings::new().exact_waveform(Waveform::Ramp(0.0)).validate().is_ok());

		let bad = [
			OutputSettings::new().frequency(-1e3),
			OutputSettings::new().frequency(0.0),
			OutputSettings::new().amplitude(f64::NAN),
			OutputSettings::new().offset(f64::INFINITY),
			OutputSettings::new().phase(f64::NAN),
			OutputSettings::new().exact_waveform(Waveform::Square(150.0)),
			OutputSettings::new().exact_waveform(Waveform::Ramp(-5.0)),
		];
		for s in bad.iter() {
			assert!(matches!(s.validate(), Err(Error::InvalidSetting{ .. })), "{:?}", s);
		}
	}

	#[test]
	fn command_text() {
		assert_eq!(Change::Shape(Shape::Puls).command(2), "SOUR2:FUNC:SHAP PULS");
		assert_eq!(Change::DutyCycle(75.0).command(1), "SOUR1:PULS:DCYC 75.0");
		assert_eq!(Change::RampSymmetry(0.0).command(1), "SOUR1:FUNC:RAMP:SYMM 0.0");
		assert_eq!(Change::Frequency(1500.0).command(1), "SOUR1:FREQ 1500");
		assert_eq!(Change::Amplitude(0.25).command(1), "SOUR1:VOLT:LEV:IMM:AMPL 0.25");
		assert_eq!(Change::Offset(-1.5).command(1), "SOUR1:VOLT:LEV:IMM:OFFS -1.5");
		assert_eq!(Change::Phase(0.5).command(1), "SOUR1:PHAS 0.5");
		assert_eq!(Change::Status(true).command(2), "OUTP2:STAT 1");
		assert_eq!(Change::Status(false).command(1), "OUTP1:STAT 0");
	}

}
