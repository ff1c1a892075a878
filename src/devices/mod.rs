
// Tektronix instruments. Sessions are generic over the transport so the same
// reconciliation logic runs against a VXI-11 link or a scripted stand-in.

use log::info;
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::tokens::find_first_number;
use crate::transport::Transport;

pub mod afg;
pub mod tds;

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),(.+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

fn match_str(opt_match:Option<Match>, reply:&str) -> Result<String> {
	match opt_match {
		Some(m) => Ok(m.as_str().trim().to_owned()),
		None    => Err(Error::malformed("*IDN?", reply)),
	}
}

impl Identity {

	pub fn parse(reply:&str) -> Result<Self> {
		let caps:Captures = IDN_RE.captures(reply).ok_or_else(|| Error::malformed("*IDN?", reply))?;
		Ok(Identity {
			manufacturer: match_str(caps.get(1), reply)?,
			model:        match_str(caps.get(2), reply)?,
			serial_num:   match_str(caps.get(3), reply)?,
			fw_version:   match_str(caps.get(4), reply)?,
		})
	}

}

/// Ask `*IDN?` and make sure the model starts with one of `families`
pub(crate) fn identify<T: Transport>(transport:&mut T, families:&[&str]) -> Result<Identity> {
	let reply = transport.query("*IDN?")?;
	let idn = Identity::parse(&reply)?;
	let model = idn.model.to_uppercase();
	if !families.iter().any(|f| model.starts_with(f)) {
		return Err(Error::WrongModel{ expected: families.join("/"), found: idn.model });
	}
	info!("Connected to {} {} (S/N {}, firmware {})", idn.manufacturer, idn.model, idn.serial_num, idn.fw_version);
	Ok(idn)
}

pub(crate) fn query_number<T: Transport>(transport:&mut T, cmd:&str) -> Result<f64> {
	let reply = transport.query(cmd)?;
	find_first_number(&reply).ok_or_else(|| Error::malformed(cmd, &reply))
}

pub(crate) fn query_bool<T: Transport>(transport:&mut T, cmd:&str) -> Result<bool> {
	let reply = transport.query(cmd)?;
	match reply.trim().to_uppercase().as_str() {
		"1" | "ON"  => Ok(true),
		"0" | "OFF" => Ok(false),
		_           => Err(Error::malformed(cmd, &reply)),
	}
}

/// Relative comparison of a cached value against a requested one. A tolerance
/// of zero is plain equality.
pub fn approx_eq(a:f64, b:f64, rel_tol:f64) -> bool {
	if rel_tol == 0.0 {
		a == b
	} else {
		(a - b).abs() <= rel_tol * a.abs().max(b.abs())
	}
}
