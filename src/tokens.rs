//! Loose, human-entered descriptors to exact instrument tokens.
//!
//! Matching is substring based and order sensitive. Every table below is an
//! ordered list of `(pattern, result)` pairs evaluated top to bottom, and the
//! first pattern contained in the (lower-cased) input wins. Inputs that match
//! nothing resolve to a default and carry a [`TokenWarning`]; normalization of
//! waveforms and measurement modes never fails.
//!
//! Two precedence rules run before the tables and are easy to trip over:
//!
//! * any waveform containing `c` that is not a square wave is sinc, so
//!   `"cosine"` resolves to [`Waveform::Sinc`];
//! * any measurement mode containing `c` is a cycle measurement, so
//!   `"frequency"` resolves to [`MeasurementMode::CycleMean`] while `"freq"`
//!   resolves to [`MeasurementMode::Frequency`].

use std::fmt;

use log::warn;
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

lazy_static! {
	static ref NUMBER_RE: Regex = Regex::new("[-+]?(\\d+\\.?\\d*|\\.\\d+)([eE][-+]?\\d+)?").unwrap();
}

pub const DEFAULT_PERCENTAGE:f64 = 50.0;

/// Duty cycles and ramp symmetries are percentages in [0, 100]
pub fn is_percentage(p:f64) -> bool { (0.0..=100.0).contains(&p) }

/// First signed decimal number found anywhere in the string
pub fn find_first_number(s:&str) -> Option<f64> {
	NUMBER_RE.find(s).and_then(|m| m.as_str().parse::<f64>().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenWarning {
	/// Nothing in the table matched; `default` was applied
	Unrecognized { input: String, default: String },
	/// The family matched but its percentage parameter was missing or outside 0 to 100
	DefaultParameter { input: String, parameter: &'static str, default: f64 },
}

impl fmt::Display for TokenWarning {

	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			TokenWarning::Unrecognized{ input, default } =>
				write!(f, "Unrecognized value '{}' ('{}' as default)", input, default),
			TokenWarning::DefaultParameter{ input, parameter, default } =>
				write!(f, "No usable {} in '{}' (default '{:.1}')", parameter, input, default),
		}
	}

}

/// A normalized value together with the warning raised while resolving it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
	pub value: T,
	pub warning: Option<TokenWarning>,
}

impl<T> Resolved<T> {

	fn exact(value:T) -> Self { Self{ value, warning: None } }

	fn warned(value:T, warning:TokenWarning) -> Self {
		warn!("{}", warning);
		Self{ value, warning: Some(warning) }
	}

	pub fn into_value(self) -> T { self.value }

}

// Waveforms

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
	Sine,
	Square(f64),
	Ramp(f64),
	Lorentzian,
	Sinc,
	Gaussian,
}

/// The generator's FUNC:SHAP register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
	Sin,
	Squ,
	Puls,
	Ramp,
	Lor,
	Sinc,
	Gaus,
	/// Anything this crate does not drive itself (noise, DC, arbitrary, ...)
	Other(String),
}

impl Shape {

	pub fn token(&self) -> &str {
		match self {
			Shape::Sin      => "SIN",
			Shape::Squ      => "SQU",
			Shape::Puls     => "PULS",
			Shape::Ramp     => "RAMP",
			Shape::Lor      => "LOR",
			Shape::Sinc     => "SINC",
			Shape::Gaus     => "GAUS",
			Shape::Other(s) => s.as_str(),
		}
	}

	/// Parse a FUNC:SHAP? reply. Accepts both short and long SCPI forms.
	pub fn from_reply(reply:&str) -> Self {
		let t = reply.trim().to_uppercase();
		match t.as_str() {
			"SIN"  | "SINUSOID"   => Shape::Sin,
			"SQU"  | "SQUARE"     => Shape::Squ,
			"PULS" | "PULSE"      => Shape::Puls,
			"RAMP"                => Shape::Ramp,
			"LOR"  | "LORENTZ"    => Shape::Lor,
			"SINC"                => Shape::Sinc,
			"GAUS" | "GAUSSIAN"   => Shape::Gaus,
			_                     => Shape::Other(t),
		}
	}

}

impl fmt::Display for Shape {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.token()) }
}

impl Waveform {

	/// Register value for this waveform. A square wave is SQU only at exactly
	/// 50 % duty cycle, otherwise it has to be played as a pulse.
	pub fn shape(&self) -> Shape {
		match self {
			Waveform::Sine                    => Shape::Sin,
			// Exact: parsed percentages are never rounded. The configured
			// tolerance only applies between cache and request.
			Waveform::Square(d) if *d == DEFAULT_PERCENTAGE => Shape::Squ,
			Waveform::Square(_)               => Shape::Puls,
			Waveform::Ramp(_)                 => Shape::Ramp,
			Waveform::Lorentzian              => Shape::Lor,
			Waveform::Sinc                    => Shape::Sinc,
			Waveform::Gaussian                => Shape::Gaus,
		}
	}

}

#[derive(Clone, Copy)]
enum Family { Sine, Square, Ramp, Lorentzian, Gaussian }

const WAVEFORM_TABLE:&[(&str, Family)] = &[
	("sin", Family::Sine),
	("pul", Family::Square),
	("tr",  Family::Ramp),		// triangle is a symmetric ramp
	("ram", Family::Ramp),
	("lo",  Family::Lorentzian),
	("g",   Family::Gaussian),
];

fn percentage(input:&str, parameter:&'static str, build:fn(f64) -> Waveform) -> Resolved<Waveform> {
	match find_first_number(input) {
		Some(p) if is_percentage(p) => Resolved::exact(build(p)),
		_ => Resolved::warned(build(DEFAULT_PERCENTAGE),
			TokenWarning::DefaultParameter{ input: input.to_owned(), parameter, default: DEFAULT_PERCENTAGE }),
	}
}

pub fn normalize_waveform(input:&str) -> Resolved<Waveform> {
	let lower = input.to_lowercase();

	if lower.contains("sq") {
		return percentage(&lower, "duty cycle", Waveform::Square);
	}

	if lower.contains('c') {
		return Resolved::exact(Waveform::Sinc);
	}

	match WAVEFORM_TABLE.iter().find(|(pat, _)| lower.contains(pat)).map(|(_, fam)| *fam) {
		Some(Family::Sine)       => Resolved::exact(Waveform::Sine),
		Some(Family::Square)     => percentage(&lower, "duty cycle", Waveform::Square),
		Some(Family::Ramp)       => percentage(&lower, "ramp symmetry", Waveform::Ramp),
		Some(Family::Lorentzian) => Resolved::exact(Waveform::Lorentzian),
		Some(Family::Gaussian)   => Resolved::exact(Waveform::Gaussian),
		None => Resolved::warned(Waveform::Sine,
			TokenWarning::Unrecognized{ input: input.to_owned(), default: Shape::Sin.token().to_owned() }),
	}
}

// Measurement modes

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementMode {
	Mean,
	Minimum,
	Maximum,
	Frequency,
	Period,
	Rms,
	PeakToPeak,
	Phase,
	CycleRms,
	CycleMean,
	RiseTime,
	FallTime,
	LowReference,
	HighReference,
}

impl MeasurementMode {

	pub fn token(&self) -> &'static str {
		match self {
			MeasurementMode::Mean          => "MEAN",
			MeasurementMode::Minimum       => "MINI",
			MeasurementMode::Maximum       => "MAXI",
			MeasurementMode::Frequency     => "FREQ",
			MeasurementMode::Period        => "PER",
			MeasurementMode::Rms           => "RMS",
			MeasurementMode::PeakToPeak    => "PK2",
			MeasurementMode::Phase         => "PHA",
			MeasurementMode::CycleRms      => "CRM",
			MeasurementMode::CycleMean     => "CMEAN",
			MeasurementMode::RiseTime      => "RIS",
			MeasurementMode::FallTime      => "FALL",
			MeasurementMode::LowReference  => "LOW",
			MeasurementMode::HighReference => "HIGH",
		}
	}

}

impl fmt::Display for MeasurementMode {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.token()) }
}

const MODE_TABLE:&[(&str, MeasurementMode)] = &[
	("me",    MeasurementMode::Mean),
	("mn",    MeasurementMode::Minimum),
	("min",   MeasurementMode::Minimum),
	("mx",    MeasurementMode::Maximum),
	("max",   MeasurementMode::Maximum),
	("fre",   MeasurementMode::Frequency),
	("per",   MeasurementMode::Period),
	("rms",   MeasurementMode::Rms),
	("pk2",   MeasurementMode::PeakToPeak),
	("amp",   MeasurementMode::PeakToPeak),
	("pea",   MeasurementMode::PeakToPeak),
	("ph",    MeasurementMode::Phase),
	("cr",    MeasurementMode::CycleRms),
	("crms",  MeasurementMode::CycleRms),
	("cm",    MeasurementMode::CycleMean),
	("cmean", MeasurementMode::CycleMean),
	("ri",    MeasurementMode::RiseTime),
	("fa",    MeasurementMode::FallTime),
	("l",     MeasurementMode::LowReference),
	("h",     MeasurementMode::HighReference),
];

pub fn normalize_measurement_mode(input:&str) -> Resolved<MeasurementMode> {
	let lower = input.to_lowercase();

	if lower.contains('c') {
		// CRM is the instrument's own short form for cycle RMS
		return if lower.contains("rms") || lower.contains("crm") {
			Resolved::exact(MeasurementMode::CycleRms)
		} else {
			Resolved::exact(MeasurementMode::CycleMean)
		};
	}

	match MODE_TABLE.iter().find(|(pat, _)| lower.contains(pat)) {
		Some((_, mode)) => Resolved::exact(*mode),
		None => Resolved::warned(MeasurementMode::Frequency,
			TokenWarning::Unrecognized{ input: input.to_owned(), default: MeasurementMode::Frequency.token().to_owned() }),
	}
}

// Channels

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelId {
	Analog(u32),
	Math,
}

impl fmt::Display for ChannelId {

	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			ChannelId::Analog(n) => write!(f, "CH{}", n),
			ChannelId::Math      => f.write_str("MATH"),
		}
	}

}

/// Anything a caller may use to name a channel: a bare number, or a string
/// such as `"2"`, `"CH2"` or `"math"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelRef<'a> {
	Number(i64),
	Name(&'a str),
}

impl<'a> From<i32>   for ChannelRef<'a> { fn from(n:i32)   -> Self { ChannelRef::Number(n as i64) } }
impl<'a> From<i64>   for ChannelRef<'a> { fn from(n:i64)   -> Self { ChannelRef::Number(n) } }
impl<'a> From<u8>    for ChannelRef<'a> { fn from(n:u8)    -> Self { ChannelRef::Number(n as i64) } }
impl<'a> From<u32>   for ChannelRef<'a> { fn from(n:u32)   -> Self { ChannelRef::Number(n as i64) } }
impl<'a> From<usize> for ChannelRef<'a> { fn from(n:usize) -> Self { ChannelRef::Number(n as i64) } }
impl<'a> From<&'a str>    for ChannelRef<'a> { fn from(s:&'a str)    -> Self { ChannelRef::Name(s) } }
impl<'a> From<&'a String> for ChannelRef<'a> { fn from(s:&'a String) -> Self { ChannelRef::Name(s.as_str()) } }

impl<'a> From<ChannelId> for ChannelRef<'a> {
	fn from(id:ChannelId) -> Self {
		match id {
			ChannelId::Analog(n) => ChannelRef::Number(n as i64),
			ChannelId::Math      => ChannelRef::Name("MATH"),
		}
	}
}

fn numbered(n:i64, channel_count:u32) -> Result<ChannelId> {
	if n < 1 || n > channel_count as i64 {
		Err(Error::OutOfRange{ channel: n.max(0).min(u32::MAX as i64) as u32, count: channel_count })
	} else {
		Ok(ChannelId::Analog(n as u32))
	}
}

pub fn normalize_channel<'a, C: Into<ChannelRef<'a>>>(input:C, channel_count:u32) -> Result<ChannelId> {
	match input.into() {
		ChannelRef::Number(n) => numbered(n, channel_count),
		ChannelRef::Name(s) => {
			if s.to_lowercase().contains('m') {
				return Ok(ChannelId::Math);
			}
			match find_first_number(s) {
				Some(x) if x.fract() == 0.0 => numbered(x as i64, channel_count),
				_ => Err(Error::InvalidChannel(s.to_owned())),
			}
		}
	}
}
