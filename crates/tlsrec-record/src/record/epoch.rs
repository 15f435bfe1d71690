//! One direction of one protected epoch.
//!
//! Fragment layouts (everything after the 5-byte header):
//!
//! ```text
//! CBC:        explicit_IV(16) || E(content || MAC || padding)
//! composite:  explicit_IV(16) || E(content || MAC || padding)
//! stream:     E(content || MAC)
//! AES-GCM:    explicit_nonce(8) || E(content) || tag(16)
//! ChaCha20:   E(content) || tag(16)
//! ```
//!
//! MAC = HMAC(mac_key, seq(8) || type(1) || version(2) || length(2) || content)
//! AEAD additional data = seq(8) || type(1) || version(2) || length(2)

use crate::keys::TrafficKeys;
use crate::suite::CipherSuiteParams;
use subtle::Choice;
use tlsrec_crypto::cipher::{AEAD_NONCE_SIZE, AES_BLOCK_SIZE, COMPOSITE_AAD_SIZE};
use tlsrec_crypto::{CipherMode, Direction, RecordMac, SessionKey};
use tlsrec_types::{ConfigError, ContentType, CryptoError, TlsError};
use zeroize::Zeroizing;

/// TLS 1.2 AEAD additional data length.
const AEAD_AAD_SIZE: usize = 13;

pub(crate) struct Epoch {
    params: CipherSuiteParams,
    key: SessionKey,
    /// Record MAC for CBC and stream suites.
    mac: Option<RecordMac>,
    fixed_iv: Zeroizing<Vec<u8>>,
}

fn additional_data(seq: u64, content_type: ContentType, version: u16, len: usize) -> [u8; 13] {
    let mut aad = [0u8; AEAD_AAD_SIZE];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type as u8;
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&(len as u16).to_be_bytes());
    aad
}

fn random_iv(out: &mut [u8]) -> Result<(), TlsError> {
    getrandom::getrandom(out).map_err(|_| TlsError::CryptoError(CryptoError::RandomFailure))
}

fn auth_failure(err: CryptoError) -> TlsError {
    match err {
        CryptoError::DecryptionFailure => TlsError::CryptographicFailure,
        other => other.into(),
    }
}

impl Epoch {
    pub(crate) fn new(
        params: &CipherSuiteParams,
        keys: &TrafficKeys,
        direction: Direction,
    ) -> Result<Self, TlsError> {
        let cipher = params.cipher;
        let mut key = cipher.init();
        match direction {
            Direction::Encrypt => key.get_encryption_key(&keys.enc_key)?,
            Direction::Decrypt => key.get_decryption_key(&keys.enc_key)?,
        }

        let mut mac = None;
        match (cipher.mode(), params.mac) {
            (CipherMode::Composite, Some(alg)) => key.set_mac_key(alg, &keys.mac_key)?,
            (CipherMode::Cbc | CipherMode::Stream, Some(alg)) => {
                mac = Some(RecordMac::new(alg, &keys.mac_key)?);
            }
            (CipherMode::Aead, None) => {}
            _ => return Err(ConfigError::UnsupportedCipherSuite(params.suite.0).into()),
        }

        let fixed_iv = match cipher.mode() {
            CipherMode::Aead => {
                if keys.fixed_iv.len() != cipher.fixed_iv_size() {
                    return Err(ConfigError::InvalidIvLength {
                        expected: cipher.fixed_iv_size(),
                        got: keys.fixed_iv.len(),
                    }
                    .into());
                }
                keys.fixed_iv.clone()
            }
            _ => Vec::new(),
        };

        Ok(Self {
            params: *params,
            key,
            mac,
            fixed_iv: Zeroizing::new(fixed_iv),
        })
    }

    pub(crate) fn params(&self) -> &CipherSuiteParams {
        &self.params
    }

    fn mac(&self) -> Result<&RecordMac, TlsError> {
        self.mac
            .as_ref()
            .ok_or(TlsError::CryptoError(CryptoError::KeyNotSet))
    }

    fn mac_len(&self) -> usize {
        self.params.mac.map_or(0, |m| m.output_size())
    }

    /// Per-record AEAD nonce.
    ///
    /// AES-GCM: fixed_iv(4) || seq(8), with seq also sent as the explicit
    /// nonce. ChaCha20-Poly1305: fixed_iv(12) XOR left-padded seq.
    fn aead_nonce(&self, seq: u64) -> [u8; AEAD_NONCE_SIZE] {
        let mut nonce = [0u8; AEAD_NONCE_SIZE];
        let seq_bytes = seq.to_be_bytes();
        if self.fixed_iv.len() == AEAD_NONCE_SIZE {
            nonce.copy_from_slice(&self.fixed_iv);
            for (n, s) in nonce[4..].iter_mut().zip(seq_bytes.iter()) {
                *n ^= s;
            }
        } else {
            nonce[..4].copy_from_slice(&self.fixed_iv);
            nonce[4..].copy_from_slice(&seq_bytes);
        }
        nonce
    }

    /// Protected fragment length for `plaintext_len` bytes of content.
    pub(crate) fn sealed_len(&self, plaintext_len: usize) -> usize {
        let cipher = self.params.cipher;
        let body = match cipher.mode() {
            CipherMode::Cbc => {
                (plaintext_len + self.mac_len() + 1).div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE
            }
            CipherMode::Stream => plaintext_len + self.mac_len(),
            CipherMode::Aead | CipherMode::Composite => cipher.encrypted_len(plaintext_len),
        };
        cipher.record_iv_size() + body
    }

    /// Largest content a fragment of `fragment_len` bytes can carry.
    pub(crate) fn max_open_len(&self, fragment_len: usize) -> usize {
        let cipher = self.params.cipher;
        let overhead = match cipher.mode() {
            CipherMode::Cbc | CipherMode::Composite => cipher.record_iv_size() + self.mac_len() + 1,
            CipherMode::Stream => self.mac_len(),
            CipherMode::Aead => cipher.record_iv_size() + cipher.tag_size(),
        };
        fragment_len.saturating_sub(overhead)
    }

    /// Protect `plaintext` into `out`, which must hold `sealed_len` bytes.
    pub(crate) fn seal(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, TlsError> {
        let total = self.sealed_len(plaintext.len());
        if out.len() < total {
            return Err(TlsError::BufferTooSmall {
                need: total,
                got: out.len(),
            });
        }
        let out = &mut out[..total];
        let n = plaintext.len();

        match self.params.cipher.mode() {
            CipherMode::Cbc => {
                let mac_len = self.mac_len();
                let (iv, body) = out.split_at_mut(AES_BLOCK_SIZE);
                let mut scratch = Zeroizing::new(vec![0u8; body.len()]);
                scratch[..n].copy_from_slice(plaintext);
                self.mac()?.compute(
                    seq,
                    content_type as u8,
                    version,
                    plaintext,
                    &mut scratch[n..n + mac_len],
                )?;
                let pad_len = (body.len() - n - mac_len - 1) as u8;
                scratch[n + mac_len..].fill(pad_len);
                random_iv(iv)?;
                self.key.encrypt(iv, &[], &scratch, body)?;
            }
            CipherMode::Stream => {
                let mac_len = self.mac_len();
                let mut scratch = Zeroizing::new(vec![0u8; n + mac_len]);
                scratch[..n].copy_from_slice(plaintext);
                self.mac()?.compute(
                    seq,
                    content_type as u8,
                    version,
                    plaintext,
                    &mut scratch[n..],
                )?;
                self.key.encrypt(&[], &[], &scratch, out)?;
            }
            CipherMode::Aead => {
                let nonce = self.aead_nonce(seq);
                let aad = additional_data(seq, content_type, version, n);
                let explicit = self.params.cipher.record_iv_size();
                out[..explicit].copy_from_slice(&seq.to_be_bytes()[..explicit]);
                self.key.encrypt(&nonce, &aad, plaintext, &mut out[explicit..])?;
            }
            CipherMode::Composite => {
                let (iv, body) = out.split_at_mut(AES_BLOCK_SIZE);
                random_iv(iv)?;
                let aad = additional_data(seq, content_type, version, 0);
                self.key
                    .encrypt(iv, &aad[..COMPOSITE_AAD_SIZE], plaintext, body)?;
            }
        }
        Ok(total)
    }

    /// Verify and decrypt `fragment` into `out`, which must hold
    /// `max_open_len` bytes. Every authentication failure, whatever its
    /// cause, is `CryptographicFailure`.
    pub(crate) fn open(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: u16,
        fragment: &[u8],
        out: &mut [u8],
    ) -> Result<usize, TlsError> {
        let max = self.max_open_len(fragment.len());
        if out.len() < max {
            return Err(TlsError::BufferTooSmall {
                need: max,
                got: out.len(),
            });
        }
        let cipher = self.params.cipher;

        match cipher.mode() {
            CipherMode::Cbc => {
                let mac_len = self.mac_len();
                let min = AES_BLOCK_SIZE
                    + (mac_len + 1).div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;
                if fragment.len() < min || fragment.len() % AES_BLOCK_SIZE != 0 {
                    return Err(TlsError::CryptographicFailure);
                }
                let (iv, body) = fragment.split_at(AES_BLOCK_SIZE);
                let mut scratch = Zeroizing::new(vec![0u8; body.len()]);
                self.key.decrypt(iv, &[], body, &mut scratch)?;

                let mac = self.mac()?;
                let (ok, content_len) =
                    mac.verify_padded(seq, content_type as u8, version, &scratch);
                if !bool::from(ok) {
                    return Err(TlsError::CryptographicFailure);
                }
                out[..content_len].copy_from_slice(&scratch[..content_len]);
                Ok(content_len)
            }
            CipherMode::Stream => {
                let mac_len = self.mac_len();
                if fragment.len() < mac_len {
                    return Err(TlsError::CryptographicFailure);
                }
                let mut scratch = Zeroizing::new(vec![0u8; fragment.len()]);
                self.key.decrypt(&[], &[], fragment, &mut scratch)?;

                let content_len = fragment.len() - mac_len;
                let (content, received) = scratch.split_at(content_len);
                let ok: Choice = self.mac()?.verify(
                    seq,
                    content_type as u8,
                    version,
                    content,
                    received,
                );
                if !bool::from(ok) {
                    return Err(TlsError::CryptographicFailure);
                }
                out[..content_len].copy_from_slice(content);
                Ok(content_len)
            }
            CipherMode::Aead => {
                let explicit = cipher.record_iv_size();
                if fragment.len() < explicit + cipher.tag_size() {
                    return Err(TlsError::CryptographicFailure);
                }
                let nonce = match explicit {
                    0 => self.aead_nonce(seq),
                    _ => {
                        let mut nonce = [0u8; AEAD_NONCE_SIZE];
                        nonce[..4].copy_from_slice(&self.fixed_iv);
                        nonce[4..].copy_from_slice(&fragment[..explicit]);
                        nonce
                    }
                };
                let sealed = &fragment[explicit..];
                let aad = additional_data(seq, content_type, version, max);
                self.key
                    .decrypt(&nonce, &aad, sealed, &mut out[..max])
                    .map_err(auth_failure)
            }
            CipherMode::Composite => {
                if fragment.len() < AES_BLOCK_SIZE {
                    return Err(TlsError::CryptographicFailure);
                }
                let (iv, body) = fragment.split_at(AES_BLOCK_SIZE);
                let mut scratch = Zeroizing::new(vec![0u8; body.len()]);
                let aad = additional_data(seq, content_type, version, 0);
                let content_len = self
                    .key
                    .decrypt(iv, &aad[..COMPOSITE_AAD_SIZE], body, &mut scratch)
                    .map_err(auth_failure)?;
                out[..content_len].copy_from_slice(&scratch[..content_len]);
                Ok(content_len)
            }
        }
    }
}

impl Drop for Epoch {
    fn drop(&mut self) {
        self.key.destroy_key();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlsrec_types::CipherSuite;

    fn epoch_pair(suite: CipherSuite, composite: bool) -> (Epoch, Epoch) {
        let params = CipherSuiteParams::from_suite(suite, composite).unwrap();
        let keys = TrafficKeys::new(
            &vec![0x11; params.mac_key_len()],
            &vec![0x22; params.key_len()],
            &vec![0x33; params.cipher.fixed_iv_size()],
        );
        (
            Epoch::new(&params, &keys, Direction::Encrypt).unwrap(),
            Epoch::new(&params, &keys, Direction::Decrypt).unwrap(),
        )
    }

    #[test]
    fn test_aead_nonce_construction() {
        let (gcm, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256, false);
        let nonce = gcm.aead_nonce(0x0102);
        assert_eq!(&nonce[..4], &[0x33; 4]);
        assert_eq!(&nonce[4..], &0x0102u64.to_be_bytes());

        let (chacha, _) = epoch_pair(
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            false,
        );
        let nonce = chacha.aead_nonce(1);
        assert_eq!(&nonce[..11], &[0x33; 11]);
        assert_eq!(nonce[11], 0x33 ^ 0x01);
    }

    #[test]
    fn test_sealed_len_per_mode() {
        let (cbc, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false);
        assert_eq!(cbc.sealed_len(4), 16 + 32);
        assert_eq!(cbc.sealed_len(11), 16 + 32);
        assert_eq!(cbc.sealed_len(12), 16 + 48);
        let (comp, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, true);
        assert_eq!(comp.sealed_len(4), 16 + 32);
        let (gcm, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384, false);
        assert_eq!(gcm.sealed_len(10), 8 + 10 + 16);
        let (rc4, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_RC4_128_MD5, false);
        assert_eq!(rc4.sealed_len(10), 10 + 16);
    }

    #[test]
    fn test_seal_open_each_mode() {
        for (suite, composite) in [
            (CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false),
            (CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256, true),
            (CipherSuite::TLS_RSA_WITH_RC4_128_SHA, false),
            (CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, false),
            (CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256, false),
        ] {
            let (mut enc, mut dec) = epoch_pair(suite, composite);
            let msg = b"epoch payload";
            let mut frag = vec![0u8; enc.sealed_len(msg.len())];
            let n = enc
                .seal(9, ContentType::ApplicationData, 0x0303, msg, &mut frag)
                .unwrap();
            assert_eq!(n, frag.len());

            let mut out = vec![0u8; dec.max_open_len(n)];
            let m = dec
                .open(9, ContentType::ApplicationData, 0x0303, &frag, &mut out)
                .unwrap();
            assert_eq!(&out[..m], msg, "{:?}", suite);
        }
    }

    #[test]
    fn test_open_binds_header_fields() {
        for (suite, composite) in [
            (CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false),
            (CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, true),
            (CipherSuite::TLS_RSA_WITH_RC4_128_MD5, false),
            (CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256, false),
        ] {
            let (mut enc, _) = epoch_pair(suite, composite);
            let mut frag = vec![0u8; enc.sealed_len(5)];
            enc.seal(0, ContentType::Handshake, 0x0303, b"hello", &mut frag)
                .unwrap();

            // Wrong content type, wrong version, wrong sequence number
            for (seq, ct, ver) in [
                (0, ContentType::ApplicationData, 0x0303),
                (0, ContentType::Handshake, 0x0302),
                (1, ContentType::Handshake, 0x0303),
            ] {
                let (_, mut dec) = epoch_pair(suite, composite);
                let mut out = vec![0u8; frag.len()];
                assert_eq!(
                    dec.open(seq, ct, ver, &frag, &mut out).unwrap_err(),
                    TlsError::CryptographicFailure,
                    "{:?}",
                    suite
                );
            }
        }
    }

    #[test]
    fn test_short_fragments_fail_generically() {
        let (_, mut dec) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false);
        let mut out = [0u8; 64];
        for len in [0, 16, 31, 33] {
            assert_eq!(
                dec.open(0, ContentType::ApplicationData, 0x0303, &vec![0u8; len], &mut out)
                    .unwrap_err(),
                TlsError::CryptographicFailure
            );
        }
        let (_, mut dec) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256, false);
        assert_eq!(
            dec.open(0, ContentType::ApplicationData, 0x0303, &[0u8; 23], &mut out)
                .unwrap_err(),
            TlsError::CryptographicFailure
        );
    }

    #[test]
    fn test_wrong_key_lengths_are_configuration_errors() {
        let params =
            CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false)
                .unwrap();
        let keys = TrafficKeys::new(&[0u8; 20], &[0u8; 15], &[]);
        let err = Epoch::new(&params, &keys, Direction::Encrypt).err().unwrap();
        assert!(err.is_configuration_error());

        let keys = TrafficKeys::new(&[0u8; 19], &[0u8; 16], &[]);
        let err = Epoch::new(&params, &keys, Direction::Encrypt).err().unwrap();
        assert!(err.is_configuration_error());

        let params = CipherSuiteParams::from_suite(
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            false,
        )
        .unwrap();
        let keys = TrafficKeys::new(&[], &[0u8; 16], &[0u8; 12]);
        let err = Epoch::new(&params, &keys, Direction::Decrypt).err().unwrap();
        assert_eq!(
            err,
            TlsError::ConfigurationError(ConfigError::InvalidIvLength {
                expected: 4,
                got: 12
            })
        );
    }

    #[test]
    fn test_output_capacity_checked_first() {
        let (mut enc, _) = epoch_pair(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false);
        let mut out = [0u8; 47];
        assert_eq!(
            enc.seal(0, ContentType::ApplicationData, 0x0303, b"ping", &mut out)
                .unwrap_err(),
            TlsError::BufferTooSmall { need: 48, got: 47 }
        );
    }
}
