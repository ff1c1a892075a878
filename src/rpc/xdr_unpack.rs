use crate::error::{Error, Result};
use crate::xdr::Unpacker;
use crate::rpc::{REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn denied(msg:&str) -> Error { Error::Communication(format!("RPC reply: {}", msg)) }

/// Consume a reply header and return its transaction id. Anything but an
/// accepted, successful reply is an error.
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> Result<u32> {
	let xid:u32 = unpacker.unpack_u32()?;

	if unpacker.unpack_enum()? != REPLY { return Err(denied("expected REPLY message type")); }

	match unpacker.unpack_enum()? {
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => Err(denied("message denied, RPC version mismatch")),
				AUTH_ERROR   => Err(denied("message denied, authentication error")),
				_            => Err(denied("message denied for an unknown reason")),
			};
		},
		MSG_ACCEPTED => { },
		_ => return Err(denied("neither MSG_DENIED nor MSG_ACCEPTED")),
	}

	// Verifier, unused with AUTH_NONE
	unpacker.unpack_enum()?;
	unpacker.unpack_opaque()?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok(xid),
		PROG_UNAVAIL  => Err(denied("program unavailable")),
		PROG_MISMATCH => Err(denied("program version mismatch")),
		PROC_UNAVAIL  => Err(denied("procedure unavailable")),
		GARBAGE_ARGS  => Err(denied("garbage arguments")),
		_             => Err(denied("call failed for an unknown reason")),
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::xdr::Packer;

	fn reply(xid:u32, accept:i32, stat:i32) -> Vec<u8> {
		let mut p = Packer::new();
		p.pack_u32(xid).unwrap();
		p.pack_enum(REPLY).unwrap();
		p.pack_enum(accept).unwrap();
		p.pack_enum(0).unwrap();
		p.pack_opaque(&[]).unwrap();
		p.pack_enum(stat).unwrap();
		p.as_bytes().to_vec()
	}

	#[test]
	fn accepted() {
		let mut u = Unpacker::new();
		u.reset(reply(42, MSG_ACCEPTED, SUCCESS));
		assert_eq!(unpack_replyheader(&mut u).unwrap(), 42);
		assert!(u.all_data_consumed());
	}

	#[test]
	fn program_unavailable() {
		let mut u = Unpacker::new();
		u.reset(reply(1, MSG_ACCEPTED, PROG_UNAVAIL));
		assert!(unpack_replyheader(&mut u).is_err());
	}

}
