
use std::collections::{HashMap, VecDeque};
use std::str;

use crate::error::{Error, Result};

/// The channel between a session and its instrument.
///
/// Implementations block until the instrument answers or the transport's own
/// timeout expires, and never retry.
pub trait Transport {

	fn write(&mut self, cmd:&str) -> Result<()>;

	/// Send a query and return the raw reply, e.g. a binary curve block
	fn query_binary(&mut self, cmd:&str) -> Result<Vec<u8>>;

	/// Send a query and return the reply as text without its line terminator
	fn query(&mut self, cmd:&str) -> Result<String> {
		let raw = self.query_binary(cmd)?;
		let s = str::from_utf8(&raw).map_err(|_| Error::Communication(format!("Reply to {} is not valid UTF-8", cmd)))?;
		Ok(s.trim_end_matches(|c| c == '\n' || c == '\r').to_owned())
	}

}

impl<T: Transport + ?Sized> Transport for &mut T {
	fn write(&mut self, cmd:&str) -> Result<()> { (**self).write(cmd) }
	fn query_binary(&mut self, cmd:&str) -> Result<Vec<u8>> { (**self).query_binary(cmd) }
	fn query(&mut self, cmd:&str) -> Result<String> { (**self).query(cmd) }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
	fn write(&mut self, cmd:&str) -> Result<()> { (**self).write(cmd) }
	fn query_binary(&mut self, cmd:&str) -> Result<Vec<u8>> { (**self).query_binary(cmd) }
	fn query(&mut self, cmd:&str) -> Result<String> { (**self).query(cmd) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
	Write(String),
	Query(String),
}

/// In-memory instrument stand-in.
///
/// Replies are registered per exact query string. Several replies to the same
/// query are handed out in order and the last one keeps being repeated. Every
/// exchange is logged so tests can check exactly what went over the wire.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	replies: HashMap<String, VecDeque<Vec<u8>>>,
	log: Vec<Exchange>,
	fail_next_write: bool,
}

impl ScriptedTransport {

	pub fn new() -> Self { Self::default() }

	pub fn reply(&mut self, query:&str, answer:&str) -> &mut Self {
		self.reply_binary(query, answer.as_bytes().to_vec())
	}

	pub fn reply_binary(&mut self, query:&str, answer:Vec<u8>) -> &mut Self {
		self.replies.entry(query.to_owned()).or_insert_with(VecDeque::new).push_back(answer);
		self
	}

	/// The next write fails with a communication error instead of being sent
	pub fn fail_next_write(&mut self) { self.fail_next_write = true; }

	pub fn log(&self) -> &[Exchange] { &self.log }

	pub fn clear_log(&mut self) { self.log.clear(); }

	pub fn writes(&self) -> Vec<&str> {
		self.log.iter().filter_map(|e| match e {
			Exchange::Write(s) => Some(s.as_str()),
			_ => None,
		}).collect()
	}

	pub fn queries(&self) -> Vec<&str> {
		self.log.iter().filter_map(|e| match e {
			Exchange::Query(s) => Some(s.as_str()),
			_ => None,
		}).collect()
	}

}

impl Transport for ScriptedTransport {

	fn write(&mut self, cmd:&str) -> Result<()> {
		if self.fail_next_write {
			self.fail_next_write = false;
			return Err(Error::Communication(format!("I/O timeout writing {}", cmd)));
		}
		self.log.push(Exchange::Write(cmd.to_owned()));
		Ok(())
	}

	fn query_binary(&mut self, cmd:&str) -> Result<Vec<u8>> {
		self.log.push(Exchange::Query(cmd.to_owned()));
		let queue = match self.replies.get_mut(cmd) {
			Some(q) if !q.is_empty() => q,
			_ => return Err(Error::Communication(format!("No reply scripted for {}", cmd))),
		};
		if queue.len() > 1 {
			Ok(queue.pop_front().unwrap_or_default())
		} else {
			Ok(queue.front().cloned().unwrap_or_default())
		}
	}

}
