#![forbid(unsafe_code)]
#![doc = "Symmetric cipher abstraction, session key material and record MAC for tlsrec."]

pub mod cipher;
pub mod mac;

pub use cipher::{Cipher, CipherMode, Direction, SessionKey};
pub use mac::{MacAlgorithm, RecordMac};
