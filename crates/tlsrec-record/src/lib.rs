#![forbid(unsafe_code)]
#![doc = "TLS record protocol for tlsrec: suite selection, traffic keys and the record codec."]

pub mod alert;
pub mod config;
pub mod keys;
pub mod record;
pub mod suite;

pub use alert::{alert_for, Alert, AlertDescription, AlertLevel};
pub use config::{RecordConfig, RecordConfigBuilder};
pub use keys::{KeyBlock, TrafficKeys};
pub use record::codec::{RecordDecoder, RecordEncoder, SequenceNumber};
pub use record::{Record, RecordHeader, RecordLayer};
pub use suite::CipherSuiteParams;
pub use tlsrec_types::{CipherSuite, ContentType, ProtocolVersion, TlsError};

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRole {
    Client,
    Server,
}
