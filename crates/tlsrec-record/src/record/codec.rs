//! Per-direction record codec state machines.
//!
//! Each direction is `NoCipher` until keys are activated, then
//! `CipherActive` for one epoch. Activating again replaces the epoch, drops
//! (and zeroizes) the old key material and restarts the sequence number.

use super::epoch::Epoch;
use super::RecordHeader;
use crate::keys::TrafficKeys;
use crate::suite::CipherSuiteParams;
use log::{debug, warn};
use tlsrec_crypto::Direction;
use tlsrec_types::{
    ContentType, ProtocolVersion, TlsError, MAXIMUM_CIPHERTEXT_EXPANSION,
    MAXIMUM_FRAGMENT_LENGTH, RECORD_HEADER_LENGTH,
};

/// 64-bit record sequence number. Never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn value(self) -> u64 {
        self.0
    }

    /// Fails once the counter can no longer advance: the last value is
    /// never used for a record.
    fn check_available(self) -> Result<u64, TlsError> {
        if self.0 == u64::MAX {
            return Err(TlsError::SequenceOverflow);
        }
        Ok(self.0)
    }

    fn advance(&mut self) {
        self.0 += 1;
    }
}

enum CipherState {
    NoCipher,
    CipherActive(Box<Epoch>),
}

impl CipherState {
    fn epoch(&mut self) -> Option<&mut Epoch> {
        match self {
            CipherState::NoCipher => None,
            CipherState::CipherActive(epoch) => Some(epoch.as_mut()),
        }
    }
}

/// Outgoing direction: plaintext to wire records.
pub struct RecordEncoder {
    state: CipherState,
    seq: SequenceNumber,
    version: ProtocolVersion,
    max_fragment_length: usize,
}

impl RecordEncoder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            state: CipherState::NoCipher,
            seq: SequenceNumber::default(),
            version,
            max_fragment_length: MAXIMUM_FRAGMENT_LENGTH,
        }
    }

    /// Cap on plaintext per record; clamped to 2^14.
    pub fn set_max_fragment_length(&mut self, len: usize) {
        self.max_fragment_length = len.min(MAXIMUM_FRAGMENT_LENGTH);
    }

    pub fn max_fragment_length(&self) -> usize {
        self.max_fragment_length
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Start a new epoch with `keys`. Replaces any current epoch.
    pub fn activate(
        &mut self,
        params: &CipherSuiteParams,
        keys: &TrafficKeys,
    ) -> Result<(), TlsError> {
        let epoch = Epoch::new(params, keys, Direction::Encrypt)?;
        self.state = CipherState::CipherActive(Box::new(epoch));
        self.seq = SequenceNumber::default();
        debug!(
            "write epoch activated: suite 0x{:04x}, cipher {}",
            params.suite.0,
            params.cipher.name()
        );
        Ok(())
    }

    /// Return to plaintext records.
    pub fn deactivate(&mut self) {
        if self.is_active() {
            debug!("write epoch deactivated");
        }
        self.state = CipherState::NoCipher;
        self.seq = SequenceNumber::default();
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, CipherState::CipherActive(_))
    }

    /// The active suite, if any.
    pub fn suite_params(&self) -> Option<&CipherSuiteParams> {
        match &self.state {
            CipherState::NoCipher => None,
            CipherState::CipherActive(epoch) => Some(epoch.params()),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq.value()
    }

    /// Wire length of a record carrying `plaintext_len` bytes.
    pub fn encoded_len(&self, plaintext_len: usize) -> usize {
        let fragment = match &self.state {
            CipherState::NoCipher => plaintext_len,
            CipherState::CipherActive(epoch) => epoch.sealed_len(plaintext_len),
        };
        RECORD_HEADER_LENGTH + fragment
    }

    /// Largest plaintext whose record fits in `record_len` bytes.
    pub fn max_plaintext_for(&self, record_len: usize) -> usize {
        let mut len = record_len
            .saturating_sub(RECORD_HEADER_LENGTH)
            .min(self.max_fragment_length);
        while len > 0 && self.encoded_len(len) > record_len {
            len -= 1;
        }
        len
    }

    /// Encode one record.
    pub fn encode(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        self.check_fragment(plaintext)?;
        let mut out = vec![0u8; self.encoded_len(plaintext.len())];
        let n = self.encode_into(content_type, plaintext, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Encode one record into `out` and return the bytes written. Lengths
    /// and capacity are checked before anything is encrypted.
    pub fn encode_into(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, TlsError> {
        self.check_fragment(plaintext)?;
        let total = self.encoded_len(plaintext.len());
        if out.len() < total {
            return Err(TlsError::BufferTooSmall {
                need: total,
                got: out.len(),
            });
        }
        let seq = self.seq.check_available()?;
        let version = self.version;

        let (header, body) = out[..total].split_at_mut(RECORD_HEADER_LENGTH);
        let fragment_len = match self.state.epoch() {
            None => {
                body.copy_from_slice(plaintext);
                plaintext.len()
            }
            Some(epoch) => epoch.seal(seq, content_type, version.0, plaintext, body)?,
        };
        RecordHeader {
            content_type,
            version,
            length: fragment_len as u16,
        }
        .write_to(header);

        self.seq.advance();
        Ok(total)
    }

    fn check_fragment(&self, plaintext: &[u8]) -> Result<(), TlsError> {
        if plaintext.len() > self.max_fragment_length {
            return Err(TlsError::RecordTooLarge {
                len: plaintext.len(),
                max: self.max_fragment_length,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, seq: u64) {
        self.seq = SequenceNumber(seq);
    }
}

/// Incoming direction: wire records to plaintext.
pub struct RecordDecoder {
    state: CipherState,
    seq: SequenceNumber,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self {
            state: CipherState::NoCipher,
            seq: SequenceNumber::default(),
        }
    }

    pub fn activate(
        &mut self,
        params: &CipherSuiteParams,
        keys: &TrafficKeys,
    ) -> Result<(), TlsError> {
        let epoch = Epoch::new(params, keys, Direction::Decrypt)?;
        self.state = CipherState::CipherActive(Box::new(epoch));
        self.seq = SequenceNumber::default();
        debug!(
            "read epoch activated: suite 0x{:04x}, cipher {}",
            params.suite.0,
            params.cipher.name()
        );
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if self.is_active() {
            debug!("read epoch deactivated");
        }
        self.state = CipherState::NoCipher;
        self.seq = SequenceNumber::default();
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, CipherState::CipherActive(_))
    }

    pub fn suite_params(&self) -> Option<&CipherSuiteParams> {
        match &self.state {
            CipherState::NoCipher => None,
            CipherState::CipherActive(epoch) => Some(epoch.params()),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq.value()
    }

    /// Largest header length field accepted in the current state.
    pub fn max_record_body(&self) -> usize {
        match self.state {
            CipherState::NoCipher => MAXIMUM_FRAGMENT_LENGTH,
            CipherState::CipherActive(_) => MAXIMUM_FRAGMENT_LENGTH + MAXIMUM_CIPHERTEXT_EXPANSION,
        }
    }

    /// Plaintext capacity `decode_into` needs for the record at the front
    /// of `data`.
    pub fn decoded_len_hint(&self, data: &[u8]) -> Result<usize, TlsError> {
        let header = RecordHeader::parse(data, self.max_record_body())?;
        let len = header.length as usize;
        Ok(match &self.state {
            CipherState::NoCipher => len,
            CipherState::CipherActive(epoch) => epoch.max_open_len(len),
        })
    }

    /// Decode the record at the front of `data`.
    ///
    /// Returns the content type, the plaintext and the bytes consumed.
    pub fn decode(&mut self, data: &[u8]) -> Result<(ContentType, Vec<u8>, usize), TlsError> {
        let mut out = vec![0u8; self.decoded_len_hint(data)?];
        let (content_type, n, consumed) = self.decode_into(data, &mut out)?;
        out.truncate(n);
        Ok((content_type, out, consumed))
    }

    /// Decode the record at the front of `data` into `out`.
    ///
    /// Returns the content type, the plaintext length and the bytes
    /// consumed. On error the contents of `out` are unspecified.
    pub fn decode_into(
        &mut self,
        data: &[u8],
        out: &mut [u8],
    ) -> Result<(ContentType, usize, usize), TlsError> {
        let header = RecordHeader::parse(data, self.max_record_body())?;
        let len = header.length as usize;
        let consumed = RECORD_HEADER_LENGTH + len;
        if data.len() < consumed {
            return Err(TlsError::RecordDecodeError("incomplete record body".into()));
        }
        let fragment = &data[RECORD_HEADER_LENGTH..consumed];
        let seq = self.seq.check_available()?;

        let n = match self.state.epoch() {
            None => {
                if out.len() < len {
                    return Err(TlsError::BufferTooSmall {
                        need: len,
                        got: out.len(),
                    });
                }
                out[..len].copy_from_slice(fragment);
                len
            }
            Some(epoch) => {
                let result = epoch.open(
                    seq,
                    header.content_type,
                    header.version.0,
                    fragment,
                    out,
                );
                if let Err(TlsError::CryptographicFailure) = result {
                    warn!("bad record MAC");
                }
                result?
            }
        };
        if n > MAXIMUM_FRAGMENT_LENGTH {
            return Err(TlsError::RecordTooLarge {
                len: n,
                max: MAXIMUM_FRAGMENT_LENGTH,
            });
        }

        self.seq.advance();
        Ok((header.content_type, n, consumed))
    }

    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, seq: u64) {
        self.seq = SequenceNumber(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlsrec_types::CipherSuite;

    fn keys_for(params: &CipherSuiteParams) -> TrafficKeys {
        TrafficKeys::new(
            &vec![0x0B; params.mac_key_len()],
            &(0..params.key_len() as u8).collect::<Vec<_>>(),
            &vec![0x0C; params.cipher.fixed_iv_size()],
        )
    }

    fn active_pair(suite: CipherSuite) -> (RecordEncoder, RecordDecoder) {
        let params = CipherSuiteParams::from_suite(suite, false).unwrap();
        let keys = keys_for(&params);
        let mut enc = RecordEncoder::new(ProtocolVersion::TLS12);
        let mut dec = RecordDecoder::new();
        enc.activate(&params, &keys).unwrap();
        dec.activate(&params, &keys).unwrap();
        (enc, dec)
    }

    #[test]
    fn test_plaintext_passthrough() {
        let mut enc = RecordEncoder::new(ProtocolVersion::TLS12);
        let mut dec = RecordDecoder::new();
        let wire = enc.encode(ContentType::Handshake, b"client hello").unwrap();
        assert_eq!(&wire[..5], &[22, 3, 3, 0, 12]);
        assert_eq!(&wire[5..], b"client hello");

        let (ct, pt, consumed) = dec.decode(&wire).unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(pt, b"client hello");
        assert_eq!(consumed, wire.len());
        assert_eq!(enc.sequence_number(), 1);
        assert_eq!(dec.sequence_number(), 1);
    }

    #[test]
    fn test_activate_resets_sequence() {
        let (mut enc, mut dec) = active_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        for _ in 0..3 {
            let wire = enc.encode(ContentType::ApplicationData, b"x").unwrap();
            dec.decode(&wire).unwrap();
        }
        assert_eq!(enc.sequence_number(), 3);
        assert_eq!(dec.sequence_number(), 3);

        let params =
            CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256, false)
                .unwrap();
        let keys = keys_for(&params);
        enc.activate(&params, &keys).unwrap();
        dec.activate(&params, &keys).unwrap();
        assert_eq!(enc.sequence_number(), 0);
        assert_eq!(dec.sequence_number(), 0);
        assert_eq!(
            enc.suite_params().unwrap().suite,
            CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256
        );

        let wire = enc.encode(ContentType::ApplicationData, b"rekeyed").unwrap();
        assert_eq!(dec.decode(&wire).unwrap().1, b"rekeyed");
    }

    #[test]
    fn test_old_epoch_records_rejected_after_rekey() {
        let (mut enc, mut dec) = active_pair(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256);
        let stale = enc.encode(ContentType::ApplicationData, b"old").unwrap();

        let params =
            CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256, false)
                .unwrap();
        let fresh = TrafficKeys::new(&[0x7F; 32], &[0x7E; 32], &[]);
        dec.activate(&params, &fresh).unwrap();
        assert_eq!(
            dec.decode(&stale).unwrap_err(),
            TlsError::CryptographicFailure
        );
    }

    #[test]
    fn test_failed_decode_does_not_advance() {
        let (mut enc, mut dec) = active_pair(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA);
        let mut wire = enc.encode(ContentType::ApplicationData, b"data").unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        assert!(dec.decode(&wire).is_err());
        assert_eq!(dec.sequence_number(), 0);
    }

    #[test]
    fn test_encoder_sequence_overflow() {
        let (mut enc, _) = active_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        enc.set_sequence_number(u64::MAX - 1);
        enc.encode(ContentType::ApplicationData, b"last").unwrap();
        assert_eq!(enc.sequence_number(), u64::MAX);
        assert_eq!(
            enc.encode(ContentType::ApplicationData, b"one more")
                .unwrap_err(),
            TlsError::SequenceOverflow
        );
    }

    #[test]
    fn test_decoder_sequence_overflow() {
        let mut enc = RecordEncoder::new(ProtocolVersion::TLS12);
        let mut dec = RecordDecoder::new();
        dec.set_sequence_number(u64::MAX);
        let wire = enc.encode(ContentType::Alert, &[1, 0]).unwrap();
        assert_eq!(dec.decode(&wire).unwrap_err(), TlsError::SequenceOverflow);
    }

    #[test]
    fn test_encode_into_checks_capacity() {
        let (mut enc, _) = active_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        let mut out = [0u8; 52];
        assert_eq!(
            enc.encode_into(ContentType::ApplicationData, b"ping", &mut out)
                .unwrap_err(),
            TlsError::BufferTooSmall { need: 53, got: 52 }
        );
        assert_eq!(enc.sequence_number(), 0);
    }

    #[test]
    fn test_decode_into_checks_capacity() {
        let (mut enc, mut dec) = active_pair(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256);
        let wire = enc.encode(ContentType::ApplicationData, b"twelve bytes").unwrap();
        assert_eq!(dec.decoded_len_hint(&wire).unwrap(), 12);
        let mut out = [0u8; 11];
        assert_eq!(
            dec.decode_into(&wire, &mut out).unwrap_err(),
            TlsError::BufferTooSmall { need: 12, got: 11 }
        );
        let mut out = [0u8; 12];
        assert_eq!(
            dec.decode_into(&wire, &mut out).unwrap(),
            (ContentType::ApplicationData, 12, wire.len())
        );
    }

    #[test]
    fn test_max_plaintext_for_record_budget() {
        let (enc, _) = active_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        let p = enc.max_plaintext_for(1440);
        assert!(enc.encoded_len(p) <= 1440);
        assert!(enc.encoded_len(p + 1) > 1440);

        let plain = RecordEncoder::new(ProtocolVersion::TLS12);
        assert_eq!(plain.max_plaintext_for(1440), 1435);
    }

    #[test]
    fn test_deactivate_returns_to_plaintext() {
        let (mut enc, mut dec) = active_pair(CipherSuite::TLS_RSA_WITH_RC4_128_SHA);
        enc.deactivate();
        dec.deactivate();
        assert!(!enc.is_active());
        assert!(dec.suite_params().is_none());
        let wire = enc.encode(ContentType::Alert, &[2, 40]).unwrap();
        assert_eq!(&wire[5..], &[2, 40]);
        assert_eq!(dec.decode(&wire).unwrap().1, vec![2, 40]);
    }
}
