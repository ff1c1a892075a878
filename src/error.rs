
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {

	#[error("Channel {channel} is out of range, instrument has {count} channel(s)")]
	OutOfRange { channel: u32, count: u32 },

	#[error("Unable to interpret '{0}' as a channel")]
	InvalidChannel(String),

	#[error("{value} is not a valid {field}")]
	InvalidSetting { field: &'static str, value: f64 },

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("Communication error: {0}")]
	Communication(String),

	#[error("Unable to parse reply {reply:?} to {query}")]
	MalformedReply { query: String, reply: String },

	#[error("Inconsistent readback: {0}")]
	InconsistentReadback(String),

	#[error("Connected to a device but it doesn't appear to be the right model (expected {expected}, found {found})")]
	WrongModel { expected: String, found: String },

	#[error("Configuration error: {0}")]
	Config(String),

}

impl Error {

	pub(crate) fn comm(msg:&str) -> Self { Error::Communication(msg.to_owned()) }

	pub(crate) fn malformed(query:&str, reply:&str) -> Self {
		Error::MalformedReply { query: query.to_owned(), reply: reply.to_owned() }
	}

	/// True for failures that originate in the transport: the cached
	/// instrument configuration can no longer be trusted after one of these.
	pub fn is_communication(&self) -> bool {
		matches!(self, Error::Io(_) | Error::Communication(_) | Error::MalformedReply{..})
	}

}
