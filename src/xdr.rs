
// External Data Representation (RFC 4506), only the subset VXI-11 needs.
// Every item is a multiple of four bytes, so alignment is preserved as long as
// variable length items are padded on the way in and skipped on the way out.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};

use crate::error::{Error, Result};

fn padding(n:usize) -> usize { (4 - n % 4) % 4 }

#[derive(Default)]
pub struct Packer {
	buff: Vec<u8>,
}

impl Packer {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn as_bytes(&self) -> &[u8] { &self.buff }

	pub fn pack_u32(&mut self, x:u32) -> io::Result<()> { self.buff.write_u32::<BigEndian>(x) }
	pub fn pack_i32(&mut self, x:i32) -> io::Result<()> { self.buff.write_i32::<BigEndian>(x) }
	pub fn pack_bool(&mut self, b:bool) -> io::Result<()> { self.pack_i32(if b {1} else {0}) }
	pub fn pack_enum(&mut self, x:i32) -> io::Result<()> { self.pack_i32(x) }

	pub fn pack_opaque(&mut self, data:&[u8]) -> io::Result<()> {
		self.pack_u32(data.len() as u32)?;
		self.buff.extend_from_slice(data);
		self.buff.extend(std::iter::repeat(0u8).take(padding(data.len())));
		Ok(())
	}

}

pub struct Unpacker {
	rdr: Cursor<Vec<u8>>,
}

impl Default for Unpacker {
	fn default() -> Self { Self{ rdr: Cursor::new(vec![]) } }
}

impl Unpacker {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self, data:Vec<u8>) { self.rdr = Cursor::new(data); }

	pub fn remaining(&self) -> usize {
		self.rdr.get_ref().len().saturating_sub(self.rdr.position() as usize)
	}

	pub fn all_data_consumed(&self) -> bool { self.remaining() == 0 }

	pub fn unpack_u32(&mut self) -> io::Result<u32> { self.rdr.read_u32::<BigEndian>() }
	pub fn unpack_i32(&mut self) -> io::Result<i32> { self.rdr.read_i32::<BigEndian>() }

	// Whether an enum value is in range depends on the application, so at this
	// level it is just an i32
	pub fn unpack_enum(&mut self) -> io::Result<i32> { self.unpack_i32() }

	pub fn unpack_opaque(&mut self) -> Result<Vec<u8>> {
		let n = self.unpack_u32()? as usize;
		if n > self.remaining() {
			return Err(Error::comm("XDR opaque length runs past the end of the buffer"));
		}
		let mut ans = vec![0u8; n];
		self.rdr.read_exact(&mut ans)?;

		let pad = padding(n).min(self.remaining());
		self.rdr.set_position(self.rdr.position() + pad as u64);
		Ok(ans)
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn opaque_is_padded_to_four_bytes() {
		let mut p = Packer::new();
		p.pack_opaque(b"inst0").unwrap();
		assert_eq!(p.as_bytes(), &[0, 0, 0, 5, b'i', b'n', b's', b't', b'0', 0, 0, 0]);
	}

	#[test]
	fn unpack_in_order() {
		let mut p = Packer::new();
		p.pack_i32(-4).unwrap();
		p.pack_opaque(b"CH1").unwrap();
		p.pack_bool(true).unwrap();
		p.pack_u32(0xdead_beef).unwrap();

		let mut u = Unpacker::new();
		u.reset(p.as_bytes().to_vec());
		assert_eq!(u.unpack_i32().unwrap(), -4);
		assert_eq!(u.unpack_opaque().unwrap(), b"CH1".to_vec());
		assert_eq!(u.unpack_i32().unwrap(), 1);
		assert_eq!(u.unpack_u32().unwrap(), 0xdead_beef);
		assert!(u.all_data_consumed());
	}

	#[test]
	fn truncated_opaque_is_an_error() {
		let mut u = Unpacker::new();
		u.reset(vec![0, 0, 0, 9, 1, 2, 3, 4]);
		assert!(u.unpack_opaque().is_err());
	}

}
