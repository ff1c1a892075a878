
// Port mapper (RFC 1833, version 2). Only GETPORT is needed to find where the
// VXI-11 core channel listens.

use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

use super::IPPROTO_TCP;
use super::xdr_pack;
use super::tcp_clients::TcpClient;

pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

pub struct TcpPortMapperClient {
	host: String,
	client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Option<Duration>) -> Result<Self> {
		let client = TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ host: host.to_owned(), client })
	}

	/// TCP port of `program`/`version` on the host
	pub fn get_port(&mut self, program:u32, version:u32) -> Result<u16> {
		self.client.start_call(PMAPPROC_GETPORT)?;
		xdr_pack::pack_mapping(&mut self.client.packer, program, version, IPPROTO_TCP, 0)?;
		self.client.do_call()?;

		let port:u32 = self.client.unpacker.unpack_u32()?;
		if !self.client.unpacker.all_data_consumed() {
			return Err(Error::comm("Data unexpectedly left over in unpacker after unpacking port"));
		}

		match port {
			0 => Err(Error::Communication(format!("Program {:#x} v{} is not registered on {}", program, version, self.host))),
			p if p > u16::MAX as u32 => Err(Error::Communication(format!("Port mapper returned invalid port {}", p))),
			p => {
				debug!("{} maps program {:#x} v{} to port {}", self.host, program, version, p);
				Ok(p as u16)
			}
		}
	}

}
