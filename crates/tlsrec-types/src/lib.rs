#![forbid(unsafe_code)]
#![doc = "Error types, protocol constants and IANA identifiers for the tlsrec record engine."]

pub mod error;
pub mod protocol;

pub use error::*;
pub use protocol::*;
