
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

pub const DEFAULT_CHANNELS:u32 = 2;
pub const DEFAULT_TX_THROTTLE_MS:u64 = 100;
pub const DEFAULT_IO_TIMEOUT_MS:u32 = 10000;
pub const DEFAULT_LOCK_TIMEOUT_MS:u32 = 10000;
pub const DEFAULT_DEVICE_NAME:&str = "inst0";
pub const DEFAULT_FLOAT_TOLERANCE:f64 = 1e-9;

/// Settings shared by every instrument session.
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```json
/// { "channels": 4, "tx_throttle_ms": 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	/// Number of analog channels on the instrument
	pub channels: u32,
	/// Delay inserted before every exchange with the instrument
	pub tx_throttle_ms: u64,
	pub io_timeout_ms: u32,
	pub lock_timeout_ms: u32,
	/// VXI-11 logical device name
	pub device_name: String,
	/// Relative tolerance used when deciding whether a cached number already
	/// matches a requested one. Zero means exact equality.
	pub float_tolerance: f64,
}

impl Default for SessionConfig {

	fn default() -> Self {
		Self {
			channels: DEFAULT_CHANNELS,
			tx_throttle_ms: DEFAULT_TX_THROTTLE_MS,
			io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
			lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
			device_name: DEFAULT_DEVICE_NAME.to_owned(),
			float_tolerance: DEFAULT_FLOAT_TOLERANCE,
		}
	}

}

impl SessionConfig {

	pub fn from_json(text:&str) -> Result<Self> {
		let cfg:SessionConfig = serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn from_file<P: AsRef<Path>>(path:P) -> Result<Self> {
		let text = fs::read_to_string(path)?;
		Self::from_json(&text)
	}

	pub fn with_channels(mut self, channels:u32) -> Self {
		self.channels = channels;
		self
	}

	pub fn tx_throttle(&self) -> Duration { Duration::from_millis(self.tx_throttle_ms) }

	pub fn io_timeout(&self) -> Duration { Duration::from_millis(self.io_timeout_ms as u64) }

	fn validate(&self) -> Result<()> {
		if self.channels == 0 {
			return Err(Error::Config("channels must be at least 1".to_owned()));
		}
		if !(self.float_tolerance >= 0.0) {
			return Err(Error::Config("float_tolerance must be a non-negative number".to_owned()));
		}
		if self.device_name.is_empty() || !self.device_name.is_ascii() {
			return Err(Error::Config("device_name must be non-empty ASCII".to_owned()));
		}
		Ok(())
	}

}
