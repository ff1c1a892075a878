
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};
use log::trace;

use crate::error::{Error, Result};
use crate::xdr::{Packer, Unpacker};

use super::{LAST_FRAGMENT, MAX_RECORD_SIZE};
use super::xdr_pack::pack_callheader_no_auth;
use super::xdr_unpack::unpack_replyheader;

/// One RPC program/version reached over a TCP stream with record marking.
/// Arguments are packed into `packer` between `start_call` and `do_call`;
/// after `do_call` returns, the results are waiting in `unpacker`.
pub struct TcpClient {
	stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, timeout:Option<Duration>) -> Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(timeout)?;
		stream.set_write_timeout(timeout)?;
		stream.set_nodelay(true)?;
		Ok(Self{ stream, prog, vers, lastxid: 0, packer: Packer::new(), unpacker: Unpacker::new() })
	}

	pub fn start_call(&mut self, prc:u32) -> Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)?;
		Ok(())
	}

	pub fn do_call(&mut self) -> Result<()> {
		let call = self.packer.as_bytes();
		let mut send_bytes:Vec<u8> = Vec::with_capacity(call.len() + 4);
		send_bytes.write_u32::<BigEndian>(call.len() as u32 | LAST_FRAGMENT)?;
		send_bytes.extend_from_slice(call);
		trace!("rpc prog={:#x} xid={} sending {} bytes", self.prog, self.lastxid, call.len());
		self.stream.write_all(&send_bytes)?;

		loop {
			let reply = self.read_record()?;
			self.unpacker.reset(reply);

			let xid = unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Stale reply to an earlier call, keep reading
				trace!("rpc dropping stale reply xid={}", xid);
				continue;
			} else {
				return Err(Error::comm("Received a reply to a call that hasn't been made yet"));
			}
		}
	}

	fn read_record(&mut self) -> Result<Vec<u8>> {
		let mut reply:Vec<u8> = vec![];
		let mut last = false;
		while !last {
			let header:u32 = self.stream.read_u32::<BigEndian>()?;
			last = (header & LAST_FRAGMENT) != 0;
			let n = (header & !LAST_FRAGMENT) as usize;

			let start = reply.len();
			if start + n > MAX_RECORD_SIZE {
				return Err(Error::Communication(format!("RPC record of more than {} bytes", MAX_RECORD_SIZE)));
			}
			reply.resize(start + n, 0);
			self.stream.read_exact(&mut reply[start..])?;
		}
		Ok(reply)
	}

}


#[cfg(test)]
mod tests {

	use super::*;
	use super::loopback::{read_call, send_reply};

	use std::net::TcpListener;
	use std::thread;

	fn serve<F: FnOnce(TcpStream) + Send + 'static>(f:F) -> (u16, thread::JoinHandle<()>) {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let handle = thread::spawn(move || {
			let (stream, _) = listener.accept().unwrap();
			f(stream);
		});
		(port, handle)
	}

	fn client(port:u16) -> TcpClient {
		TcpClient::connect(("127.0.0.1", port), 0x2000, 1, Some(Duration::from_secs(5))).unwrap()
	}

	#[test]
	fn fragments_and_stale_replies() {
		let (port, server) = serve(|mut s| {
			let call = read_call(&mut s);
			assert_eq!(call.prc, 7);
			assert_eq!(call.args, vec![0, 0, 0, 42]);
			send_reply(&mut s, call.xid.wrapping_sub(1), &[0, 0, 0, 1], 1);
			send_reply(&mut s, call.xid, &[0, 0, 0, 9, 0, 0, 0, 8], 3);
		});

		let mut c = client(port);
		c.lastxid = 10;
		c.start_call(7).unwrap();
		c.packer.pack_u32(42).unwrap();
		c.do_call().unwrap();

		assert_eq!(c.lastxid, 11);
		assert_eq!(c.unpacker.unpack_u32().unwrap(), 9);
		assert_eq!(c.unpacker.unpack_u32().unwrap(), 8);
		assert!(c.unpacker.all_data_consumed());
		server.join().unwrap();
	}

	#[test]
	fn reply_from_the_future() {
		let (port, server) = serve(|mut s| {
			let call = read_call(&mut s);
			send_reply(&mut s, call.xid + 5, &[], 1);
		});

		let mut c = client(port);
		c.start_call(1).unwrap();
		assert!(matches!(c.do_call(), Err(Error::Communication(_))));
		server.join().unwrap();
	}

	#[test]
	fn oversized_record() {
		let (port, server) = serve(|mut s| {
			read_call(&mut s);
			s.write_all(&(0x7fff_fff0u32 | LAST_FRAGMENT).to_be_bytes()).unwrap();
		});

		let mut c = client(port);
		c.start_call(1).unwrap();
		assert!(matches!(c.do_call(), Err(Error::Communication(_))));
		server.join().unwrap();
	}

}
