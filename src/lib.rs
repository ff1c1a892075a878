
#[macro_use]
extern crate lazy_static;

pub mod error;
pub use error::{Error, Result};

pub mod config;

// Loose descriptors ("squ75", "min", "ch2") to exact instrument tokens
pub mod tokens;

// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// What a session needs from its instrument link, plus a scripted stand-in
pub mod transport;

// Tektronix oscilloscopes and function generators
pub mod devices;

pub mod analysis;
