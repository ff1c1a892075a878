//! Tektronix TDS/TBS/TPS digital oscilloscopes.
//!
//! These instruments have a single "immediate measurement" register shared by
//! all channels. The session caches its source and type as one slot, so a
//! measurement on CH2 after one on CH1 always rewrites the source first.

use std::str;

use log::{debug, info};
use serde::{Serialize, Deserialize};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::tokens::{self, ChannelId, ChannelRef, MeasurementMode};
use crate::transport::Transport;

use super::{identify, query_number, Identity};

pub const MODEL_FAMILIES:&[&str] = &["TDS", "TBS", "TPS"];

pub const PREAMBLE_QUERY:&str = "WFMPRE:XZE?;XIN?;YZE?;YMU?;YOFF?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementState {
	pub source: ChannelId,
	pub mode: MeasurementMode,
}

// What the session believes the measurement register holds. Either half can
// be unknown when the instrument was left on something this crate doesn't
// drive (REF traces, width measurements, ...), in which case it is rewritten.
#[derive(Debug, Clone, Copy, Default)]
struct MeasurementCache {
	source: Option<ChannelId>,
	mode: Option<MeasurementMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
	pub channel: ChannelId,
	pub mode: MeasurementMode,
	pub value: f64,
	pub units: String,
}

/// Scaling of a curve transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
	pub xze: f64,
	pub xin: f64,
	pub yze: f64,
	pub ymu: f64,
	pub yoff: f64,
}

impl Preamble {

	pub fn parse(reply:&str) -> Result<Self> {
		let values = reply.trim().split(';')
			.filter(|s| !s.trim().is_empty())
			.map(|s| tokens::find_first_number(s))
			.collect::<Option<Vec<f64>>>()
			.ok_or_else(|| Error::malformed(PREAMBLE_QUERY, reply))?;

		match values.as_slice() {
			&[xze, xin, yze, ymu, yoff] => Ok(Preamble{ xze, xin, yze, ymu, yoff }),
			_ => Err(Error::malformed(PREAMBLE_QUERY, reply)),
		}
	}

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
	pub channel: ChannelId,
	pub preamble: Preamble,
	pub time: Vec<f64>,
	pub voltage: Vec<f64>,
}

impl Trace {

	/// Scale raw unsigned samples into seconds and volts
	pub fn from_raw(channel:ChannelId, preamble:Preamble, raw:&[u8]) -> Self {
		let time = (0..raw.len()).map(|i| preamble.xze + (i as f64)*preamble.xin).collect();
		let voltage = raw.iter().map(|r| preamble.yze + preamble.ymu*((*r as f64) - preamble.yoff)).collect();
		Trace{ channel, preamble, time, voltage }
	}

	pub fn len(&self) -> usize { self.voltage.len() }

	pub fn is_empty(&self) -> bool { self.voltage.is_empty() }

	pub fn sample_rate(&self) -> f64 { 1.0 / self.preamble.xin }

}

/// Traces captured from one acquisition. All traces share a time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
	pub traces: Vec<Trace>,
}

impl Screen {

	pub fn points(&self) -> usize { self.traces.first().map(|t| t.len()).unwrap_or(0) }

	pub fn trace(&self, channel:ChannelId) -> Option<&Trace> {
		self.traces.iter().find(|t| t.channel == channel)
	}

}

/// Payload of an IEEE 488.2 block: `#<n><n digits of length><data>`, or
/// `#0<data>` terminated by the end of the message
pub fn decode_block(reply:&[u8]) -> Result<&[u8]> {
	let bad = |msg:&str| Error::Communication(format!("Malformed binary block: {}", msg));

	if reply.first() != Some(&b'#') {
		return Err(bad("missing '#'"));
	}
	let ndigits = match reply.get(1) {
		Some(d) if d.is_ascii_digit() => (d - b'0') as usize,
		_ => return Err(bad("missing length digit count")),
	};

	if ndigits == 0 {
		let body = &reply[2..];
		return Ok(body.strip_suffix(b"\n").unwrap_or(body));
	}

	let header_end = 2 + ndigits;
	let len_bytes = reply.get(2..header_end).ok_or_else(|| bad("truncated header"))?;
	let len = str::from_utf8(len_bytes).ok()
		.and_then(|s| s.parse::<usize>().ok())
		.ok_or_else(|| bad("non-numeric length"))?;

	reply.get(header_end..header_end + len).ok_or_else(|| bad("fewer data bytes than announced"))
}

fn source_from_reply(reply:&str, channel_count:u32) -> Option<ChannelId> {
	let t = reply.trim().to_uppercase();
	if t == "MATH" {
		return Some(ChannelId::Math);
	}
	let n = t.strip_prefix("CH")?.parse::<u32>().ok()?;
	if n >= 1 && n <= channel_count { Some(ChannelId::Analog(n)) } else { None }
}

fn mode_from_reply(reply:&str) -> Option<MeasurementMode> {
	let t = reply.trim().to_uppercase();
	let mode = match t.as_str() {
		"MEAN"              => MeasurementMode::Mean,
		"MINI" | "MINIMUM"  => MeasurementMode::Minimum,
		"MAXI" | "MAXIMUM"  => MeasurementMode::Maximum,
		"FREQ" | "FREQUENCY"=> MeasurementMode::Frequency,
		"PER" | "PERI" | "PERIOD" => MeasurementMode::Period,
		"RMS"               => MeasurementMode::Rms,
		"PK2" | "PK2PK"     => MeasurementMode::PeakToPeak,
		"PHA" | "PHASE"     => MeasurementMode::Phase,
		"CRM" | "CRMS"      => MeasurementMode::CycleRms,
		"CME" | "CMEAN"     => MeasurementMode::CycleMean,
		"RIS" | "RISE"      => MeasurementMode::RiseTime,
		"FALL"              => MeasurementMode::FallTime,
		"LOW"               => MeasurementMode::LowReference,
		"HIGH"              => MeasurementMode::HighReference,
		_                   => return None,
	};
	Some(mode)
}

pub struct Tds<T: Transport> {
	transport: T,
	cfg: SessionConfig,
	identity: Identity,
	cache: Option<MeasurementCache>,
}

impl<T: Transport> Tds<T> {

	/// Identify the instrument, switch curve transfers to one unsigned byte per
	/// point and read the measurement register
	pub fn connect(mut transport:T, cfg:SessionConfig) -> Result<Self> {
		let identity = identify(&mut transport, MODEL_FAMILIES)?;

		transport.write("DAT:ENC RPB")?;
		transport.write("DAT:WID 1")?;

		let mut osci = Self{ transport, cfg, identity, cache: None };
		osci.resync()?;
		Ok(osci)
	}

	pub fn identity(&self) -> &Identity { &self.identity }

	pub fn channels(&self) -> u32 { self.cfg.channels }

	/// Cached measurement register, if both halves are known
	pub fn measurement_state(&self) -> Option<MeasurementState> {
		match self.cache {
			Some(MeasurementCache{ source: Some(source), mode: Some(mode) }) => Some(MeasurementState{ source, mode }),
			_ => None,
		}
	}

	pub fn invalidate(&mut self) { self.cache = None; }

	pub fn transport(&self) -> &T { &self.transport }
	pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }
	pub fn into_transport(self) -> T { self.transport }

	/// Read the measurement register back from the instrument
	pub fn resync(&mut self) -> Result<Option<MeasurementState>> {
		self.cache = None;
		let src = self.transport.query("MEASU:IMM:SOU?")?;
		let typ = self.transport.query("MEASU:IMM:TYP?")?;

		let cache = MeasurementCache{
			source: source_from_reply(&src, self.cfg.channels),
			mode: mode_from_reply(&typ),
		};
		debug!("Measurement register read back as {:?} ({:?}, {:?})", cache, src, typ);
		self.cache = Some(cache);
		Ok(self.measurement_state())
	}

	fn channel_list<'a, C: Into<ChannelRef<'a>> + Copy>(&self, channels:&[C]) -> Result<Vec<ChannelId>> {
		channels.iter().map(|c| tokens::normalize_channel(*c, self.cfg.channels)).collect()
	}

	fn write_or_invalidate(&mut self, cmd:&str) -> Result<()> {
		debug!("{}", cmd);
		self.transport.write(cmd).map_err(|e| { self.cache = None; e })
	}

	/// Point the shared measurement register at `channel`/`mode`, writing only
	/// the halves that differ from the cache
	pub fn configure_measurement(&mut self, mode:MeasurementMode, channel:ChannelId) -> Result<()> {
		if self.cache.is_none() {
			self.resync()?;
		}
		let current = self.cache.unwrap_or_default();

		if current.source != Some(channel) {
			self.write_or_invalidate(&format!("MEASU:IMM:SOU {}", channel))?;
			debug!("Measure source changed to '{}'", channel);
		}
		if let Some(c) = self.cache.as_mut() { c.source = Some(channel); }

		if current.mode != Some(mode) {
			self.write_or_invalidate(&format!("MEASU:IMM:TYP {}", mode.token()))?;
			debug!("Measure type changed to '{}'", mode);
		}
		if let Some(c) = self.cache.as_mut() { c.mode = Some(mode); }

		Ok(())
	}

	/// One measurement on one channel
	pub fn measure_on(&mut self, mode:MeasurementMode, channel:ChannelId) -> Result<Measurement> {
		self.configure_measurement(mode, channel)?;

		let value = query_number(&mut self.transport, "MEASU:IMM:VAL?").map_err(|e| { self.cache = None; e })?;
		let units = self.transport.query("MEASU:IMM:UNI?").map_err(|e| { self.cache = None; e })?;
		let units = units.trim().trim_matches('"').to_owned();

		info!("{} on {}: {} {}", mode, channel, value, units);
		Ok(Measurement{ channel, mode, value, units })
	}

	/// Measure `mode` (free-form, e.g. `"min"` or `"pk2pk"`) on each channel in
	/// turn. Every channel is validated before anything is sent.
	pub fn measure<'a, C: Into<ChannelRef<'a>> + Copy>(&mut self, mode:&str, channels:&[C]) -> Result<Vec<Measurement>> {
		let mode = tokens::normalize_measurement_mode(mode).into_value();
		let channels = self.channel_list(channels)?;

		let mut ans = Vec::with_capacity(channels.len());
		for ch in channels {
			ans.push(self.measure_on(mode, ch)?);
		}
		Ok(ans)
	}

	pub fn read_preamble(&mut self) -> Result<Preamble> {
		let reply = self.transport.query(PREAMBLE_QUERY)?;
		Preamble::parse(&reply)
	}

	pub fn read_trace(&mut self, channel:ChannelId) -> Result<Trace> {
		self.transport.write(&format!("DAT:SOU {}", channel))?;
		let preamble = self.read_preamble()?;
		let reply = self.transport.query_binary("CURV?")?;
		let raw = decode_block(&reply)?;
		Ok(Trace::from_raw(channel, preamble, raw))
	}

	/// Transfer the displayed curve of each channel
	pub fn screen<'a, C: Into<ChannelRef<'a>> + Copy>(&mut self, channels:&[C]) -> Result<Screen> {
		let channels = self.channel_list(channels)?;

		let mut traces:Vec<Trace> = Vec::with_capacity(channels.len());
		for ch in channels {
			traces.push(self.read_trace(ch)?);
		}

		if let Some(first) = traces.first() {
			if let Some(other) = traces.iter().find(|t| t.len() != first.len()) {
				return Err(Error::InconsistentReadback(format!("{} returned {} points but {} returned {}",
					first.channel, first.len(), other.channel, other.len())));
			}
		}

		Ok(Screen{ traces })
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn definite_block() {
		let reply = b"#14\x00\x7f\x80\xff\n";
		assert_eq!(decode_block(reply).unwrap(), &[0x00, 0x7f, 0x80, 0xff]);
	}

	#[test]
	fn indefinite_block() {
		assert_eq!(decode_block(b"#0\x01\x02\n").unwrap(), &[1, 2]);
	}

	#[test]
	fn short_block() {
		assert!(decode_block(b"#210abc").is_err());
		assert!(decode_block(b"2500").is_err());
	}

	#[test]
	fn preamble() {
		let p = Preamble::parse("-5.0E-3;1.0E-5;0.0E0;4.0E-2;1.28E2").unwrap();
		assert_eq!(p, Preamble{ xze: -5.0e-3, xin: 1.0e-5, yze: 0.0, ymu: 4.0e-2, yoff: 128.0 });
		assert!(Preamble::parse("1;2;3").is_err());
	}

	#[test]
	fn scaling() {
		let p = Preamble{ xze: 1.0, xin: 0.5, yze: 0.1, ymu: 2.0, yoff: 128.0 };
		let t = Trace::from_raw(ChannelId::Analog(1), p, &[128, 130]);
		assert_eq!(t.time, vec![1.0, 1.5]);
		assert_eq!(t.voltage, vec![0.1, 4.1]);
		assert_eq!(t.sample_rate(), 2.0);
	}

	#[test]
	fn register_replies() {
		assert_eq!(source_from_reply("CH2\n", 2), Some(ChannelId::Analog(2)));
		assert_eq!(source_from_reply("MATH", 2), Some(ChannelId::Math));
		assert_eq!(source_from_reply("CH4", 2), None);
		assert_eq!(source_from_reply("REF1", 2), None);
		assert_eq!(mode_from_reply("MINI"), Some(MeasurementMode::Minimum));
		assert_eq!(mode_from_reply("CRMS"), Some(MeasurementMode::CycleRms));
		assert_eq!(mode_from_reply("PWIDTH"), None);
	}

}
