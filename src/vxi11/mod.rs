
// VXI-11 core channel. Enough of the protocol to hold one link and push SCPI
// text through device_write/device_read.

use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::rpc::port_mapping::TcpPortMapperClient;
use crate::rpc::tcp_clients::TcpClient;
use crate::transport::Transport;

pub mod xdr_pack;

// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// device_read reason bits
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

pub const READ_REQUEST_SIZE:u32 = 0x0010_0000;

fn device_error(code:i32) -> Result<()> {
	let msg = match code {
		0  => return Ok(()),
		1  => "Syntax error",
		3  => "Device not accessible",
		4  => "Invalid link identifier",
		5  => "Parameter error",
		6  => "Channel not established",
		8  => "Operation not supported",
		9  => "Out of resources",
		11 => "Device locked by another link",
		12 => "No lock held by this link",
		15 => "I/O timeout",
		17 => "I/O error",
		21 => "Invalid address",
		23 => "Abort",
		29 => "Channel already established",
		_  => return Err(Error::Communication(format!("Unknown VXI-11 device error {}", code))),
	};
	Err(Error::comm(msg))
}

struct Link {
	link_id: i32,
	max_recv_size: u32,
}

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
	io_timeout_ms: u32,
	lock_timeout_ms: u32,
	tx_throttle: Duration,
}

impl CoreClient {

	fn link(&self) -> Result<&Link> {
		self.opt_link.as_ref().ok_or_else(|| Error::comm("No link"))
	}

	/// Look up the core channel through the port mapper and connect to it
	pub fn new(host:&str, cfg:&SessionConfig) -> Result<Self> {
		let port = TcpPortMapperClient::new(host, Some(cfg.io_timeout()))?.get_port(DEVICE_CORE_PROG, DEVICE_CORE_VERS)?;
		Self::with_port(host, port, cfg)
	}

	/// Connect to a core channel whose port is already known
	pub fn with_port(host:&str, port:u16, cfg:&SessionConfig) -> Result<Self> {
		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, Some(cfg.io_timeout()))?;

		Ok(CoreClient {
			client,
			opt_link: None,
			io_timeout_ms: cfg.io_timeout_ms,
			lock_timeout_ms: cfg.lock_timeout_ms,
			tx_throttle: cfg.tx_throttle(),
		})
	}

	/// Connect and create a link to `cfg.device_name` in one go
	pub fn open(host:&str, cfg:&SessionConfig) -> Result<Self> {
		let mut core = Self::new(host, cfg)?;
		core.create_link(&cfg.device_name)?;
		Ok(core)
	}

	pub fn create_link(&mut self, device:&str) -> Result<()> {
		if self.opt_link.is_some() {
			return Err(Error::comm("Already connected to a link"));
		}

		self.client.start_call(CREATE_LINK)?;
		xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, self.lock_timeout_ms, device)?;
		self.client.do_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let _abort_port:u32   = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;
		device_error(error)?;

		debug!("created link {} to {} (max_recv_size={})", link_id, device, max_recv_size);
		self.opt_link = Some(Link{ link_id, max_recv_size });
		Ok(())
	}

	/// Send one message, split into pieces no larger than the device accepts.
	/// Only the last piece carries END.
	pub fn write_bytes(&mut self, data:&[u8]) -> Result<()> {
		let (link_id, max_recv_size) = self.link().map(|l| (l.link_id, l.max_recv_size))?;
		let chunk_size = if max_recv_size == 0 { data.len().max(1) } else { max_recv_size as usize };

		let mut chunks:Vec<&[u8]> = data.chunks(chunk_size).collect();
		if chunks.is_empty() {
			chunks.push(data);
		}
		let last = chunks.len() - 1;

		for (i, chunk) in chunks.into_iter().enumerate() {
			let flags = if i == last { OPERATION_FLAGS_END_ONLY } else { 0 };

			self.client.start_call(DEVICE_WRITE)?;
			xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, self.io_timeout_ms, self.lock_timeout_ms, flags, chunk)?;
			self.client.do_call()?;

			let error:i32 = self.client.unpacker.unpack_i32()?;
			let size:u32  = self.client.unpacker.unpack_u32()?;
			device_error(error)?;

			if size as usize != chunk.len() {
				return Err(Error::comm("Number of bytes in confirmation doesn't match number of bytes sent"));
			}
		}
		Ok(())
	}

	/// Read one complete response, following REQCNT/CHR continuations until
	/// the device flags END
	pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
		let link_id = self.link()?.link_id;
		let mut ans:Vec<u8> = vec![];

		loop {
			self.client.start_call(DEVICE_READ)?;
			xdr_pack::pack_device_read_parms(&mut self.client.packer, link_id, READ_REQUEST_SIZE, self.io_timeout_ms, self.lock_timeout_ms, 0, 0)?;
			self.client.do_call()?;

			let error:i32  = self.client.unpacker.unpack_i32()?;
			let reason:i32 = self.client.unpacker.unpack_i32()?;
			let mut data   = self.client.unpacker.unpack_opaque()?;
			device_error(error)?;

			ans.append(&mut data);
			if reason & REASON_END != 0 {
				return Ok(ans);
			}
			if reason & (REASON_REQCNT | REASON_CHR) == 0 {
				return Err(Error::comm("device_read returned without any reason bit set"));
			}
			trace!("device_read continuing after reason={} with {} bytes so far", reason, ans.len());
		}
	}

	pub fn destroy_link(&mut self) -> Result<()> {
		let link_id = self.link()?.link_id;
		self.client.start_call(DESTROY_LINK)?;
		self.client.packer.pack_i32(link_id)?;
		self.client.do_call()?;

		self.opt_link = None;
		device_error(self.client.unpacker.unpack_i32()?)
	}

	pub fn close(mut self) -> Result<()> {
		let res = self.destroy_link();
		// Drop has nothing left to do whether or not that worked
		self.opt_link = None;
		res
	}

}

impl Transport for CoreClient {

	fn write(&mut self, cmd:&str) -> Result<()> {
		thread::sleep(self.tx_throttle);
		trace!("-> {}", cmd);
		self.write_bytes(cmd.as_bytes())
	}

	fn query_binary(&mut self, cmd:&str) -> Result<Vec<u8>> {
		self.write(cmd)?;
		let ans = self.read_bytes()?;
		trace!("<- {} bytes", ans.len());
		Ok(ans)
	}

}

impl Drop for CoreClient {

	fn drop(&mut self) {
		if self.opt_link.is_some() {
			if let Err(e) = self.destroy_link() {
				warn!("Unable to destroy VXI-11 link: {}", e);
			}
		}
	}

}
