//! TLS record layer: parsing, serialization, fragmentation, and protection.

pub mod codec;
mod epoch;

use crate::config::RecordConfig;
use crate::keys::TrafficKeys;
use crate::suite::CipherSuiteParams;
use codec::{RecordDecoder, RecordEncoder};
use tlsrec_types::{
    CipherSuite, ContentType, ProtocolVersion, TlsError, MAXIMUM_CIPHERTEXT_EXPANSION,
    MAXIMUM_FRAGMENT_LENGTH, RECORD_HEADER_LENGTH, SMALL_RECORD_LENGTH,
};

/// The 5-byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub length: u16,
}

impl RecordHeader {
    /// Parse the header at the front of `data`, accepting a length field up
    /// to `max_length`.
    pub fn parse(data: &[u8], max_length: usize) -> Result<Self, TlsError> {
        if data.len() < RECORD_HEADER_LENGTH {
            return Err(TlsError::RecordDecodeError(
                "incomplete record header".into(),
            ));
        }
        let content_type = ContentType::from_u8(data[0])
            .map_err(|v| TlsError::RecordDecodeError(format!("unknown content type {v}")))?;
        let version = ProtocolVersion(u16::from_be_bytes([data[1], data[2]]));
        if version.major() != 3 {
            return Err(TlsError::RecordDecodeError(format!(
                "unsupported record version 0x{:04x}",
                version.0
            )));
        }
        let length = u16::from_be_bytes([data[3], data[4]]);
        if length as usize > max_length {
            return Err(TlsError::RecordDecodeError(format!(
                "record length {length} exceeds {max_length}"
            )));
        }
        Ok(Self {
            content_type,
            version,
            length,
        })
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LENGTH] {
        let [v0, v1] = self.version.to_bytes();
        let [l0, l1] = self.length.to_be_bytes();
        [self.content_type as u8, v0, v1, l0, l1]
    }

    /// `out` must be exactly `RECORD_HEADER_LENGTH` bytes.
    pub(crate) fn write_to(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_bytes());
    }
}

/// A parsed TLS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub fragment: Vec<u8>,
}

/// Record layer state for reading and writing TLS records.
///
/// Supports both plaintext mode (initial handshake) and protected mode
/// (after traffic keys are activated). Protection is per-direction:
/// write encryption and read decryption are activated independently.
pub struct RecordLayer {
    config: RecordConfig,
    encoder: RecordEncoder,
    decoder: RecordDecoder,
}

impl RecordLayer {
    pub fn new(config: RecordConfig) -> Self {
        let mut encoder = RecordEncoder::new(config.version);
        encoder.set_max_fragment_length(config.max_fragment_length);
        Self {
            config,
            encoder,
            decoder: RecordDecoder::new(),
        }
    }

    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// Returns true if write encryption is active.
    pub fn is_encrypting(&self) -> bool {
        self.encoder.is_active()
    }

    /// Returns true if read decryption is active.
    pub fn is_decrypting(&self) -> bool {
        self.decoder.is_active()
    }

    pub fn write_sequence_number(&self) -> u64 {
        self.encoder.sequence_number()
    }

    pub fn read_sequence_number(&self) -> u64 {
        self.decoder.sequence_number()
    }

    /// Activate write encryption with the given traffic keys.
    ///
    /// Replaces any existing write epoch (resets the sequence number to 0).
    pub fn activate_write_encryption(
        &mut self,
        suite: CipherSuite,
        keys: &TrafficKeys,
    ) -> Result<(), TlsError> {
        let params = CipherSuiteParams::from_suite(suite, self.config.prefer_composite)?;
        self.encoder.activate(&params, keys)
    }

    /// Activate read decryption with the given traffic keys.
    ///
    /// Replaces any existing read epoch (resets the sequence number to 0).
    pub fn activate_read_decryption(
        &mut self,
        suite: CipherSuite,
        keys: &TrafficKeys,
    ) -> Result<(), TlsError> {
        let params = CipherSuiteParams::from_suite(suite, self.config.prefer_composite)?;
        self.decoder.activate(&params, keys)
    }

    /// Deactivate write encryption (return to plaintext mode).
    pub fn deactivate_write_encryption(&mut self) {
        self.encoder.deactivate();
    }

    /// Deactivate read decryption (return to plaintext mode).
    pub fn deactivate_read_decryption(&mut self) {
        self.decoder.deactivate();
    }

    /// Protect (if active) and serialize one record.
    pub fn seal_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        self.encoder.encode(content_type, plaintext)
    }

    /// Split `data` into as many records as needed and return them
    /// back to back. Empty input still produces one empty record.
    ///
    /// With `small_records`, each record fits in `SMALL_RECORD_LENGTH`
    /// bytes; otherwise each carries up to `max_fragment_length` bytes.
    pub fn seal_fragmented(
        &mut self,
        content_type: ContentType,
        data: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let limit = if self.config.small_records {
            self.encoder.max_plaintext_for(SMALL_RECORD_LENGTH)
        } else {
            self.encoder.max_fragment_length()
        };
        let chunk = limit.max(1);

        if data.is_empty() {
            return self.seal_record(content_type, data);
        }
        let records = data.len().div_ceil(chunk);
        let mut out = Vec::with_capacity(records * self.encoder.encoded_len(chunk));
        for piece in data.chunks(chunk) {
            let start = out.len();
            out.resize(start + self.encoder.encoded_len(piece.len()), 0);
            let n = self
                .encoder
                .encode_into(content_type, piece, &mut out[start..])?;
            out.truncate(start + n);
        }
        Ok(out)
    }

    /// Parse and, if active, verify and decrypt the record at the front of
    /// `data`.
    ///
    /// Returns (content_type, plaintext, bytes_consumed).
    pub fn open_record(&mut self, data: &[u8]) -> Result<(ContentType, Vec<u8>, usize), TlsError> {
        self.decoder.decode(data)
    }

    /// Parse a TLS record from the given bytes without removing protection.
    pub fn parse_record(&self, data: &[u8]) -> Result<(Record, usize), TlsError> {
        let header = RecordHeader::parse(data, self.decoder.max_record_body())?;
        let length = header.length as usize;
        if data.len() < RECORD_HEADER_LENGTH + length {
            return Err(TlsError::RecordDecodeError("incomplete record body".into()));
        }
        let fragment = data[RECORD_HEADER_LENGTH..RECORD_HEADER_LENGTH + length].to_vec();
        Ok((
            Record {
                content_type: header.content_type,
                version: header.version,
                fragment,
            },
            RECORD_HEADER_LENGTH + length,
        ))
    }

    /// Serialize a TLS record to bytes.
    pub fn serialize_record(&self, record: &Record) -> Result<Vec<u8>, TlsError> {
        let max = MAXIMUM_FRAGMENT_LENGTH + MAXIMUM_CIPHERTEXT_EXPANSION;
        if record.fragment.len() > max {
            return Err(TlsError::RecordTooLarge {
                len: record.fragment.len(),
                max,
            });
        }
        let header = RecordHeader {
            content_type: record.content_type,
            version: record.version,
            length: record.fragment.len() as u16,
        };
        let mut buf = Vec::with_capacity(RECORD_HEADER_LENGTH + record.fragment.len());
        buf.extend_from_slice(&header.to_bytes());
        buf.extend_from_slice(&record.fragment);
        Ok(buf)
    }
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new(RecordConfig::default())
    }
}
