use std::io;

use crate::xdr::Packer;
use crate::rpc::{CALL, RPCVERSION};

// AUTH_NONE: flavor zero with an empty body
pub fn pack_auth_none(packer:&mut Packer) -> io::Result<()> {
	packer.pack_enum(0)?;
	packer.pack_opaque(&[])
}

pub fn pack_callheader_no_auth(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32) -> io::Result<()> {
	packer.pack_u32(xid)?;
	packer.pack_enum(CALL)?;
	packer.pack_u32(RPCVERSION)?;
	packer.pack_u32(prog)?;
	packer.pack_u32(vers)?;
	packer.pack_u32(prc)?;
	pack_auth_none(packer)?;	// credentials
	pack_auth_none(packer)		// verifier
}

pub fn pack_mapping(packer:&mut Packer, prog:u32, vers:u32, prot:u32, port:u32) -> io::Result<()> {
	packer.pack_u32(prog)?;
	packer.pack_u32(vers)?;
	packer.pack_u32(prot)?;
	packer.pack_u32(port)
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn callheader_layout() {
		let mut p = Packer::new();
		pack_callheader_no_auth(&mut p, 7, 0x0607af, 1, 10).unwrap();
		// xid, CALL, version, prog, vers, proc, two empty auths
		assert_eq!(p.as_bytes().len(), 6*4 + 2*8);
		assert_eq!(&p.as_bytes()[..4], &[0, 0, 0, 7]);
		assert_eq!(&p.as_bytes()[12..16], &[0, 0x06, 0x07, 0xaf]);
	}

}
