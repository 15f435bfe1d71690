//! Negotiated cipher suite to record protection parameters.

use tlsrec_crypto::{Cipher, CipherMode, MacAlgorithm};
use tlsrec_types::{CipherSuite, ConfigError, TlsError};

/// Record protection parameters for one negotiated cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    /// The cipher suite identifier.
    pub suite: CipherSuite,
    /// Record cipher.
    pub cipher: Cipher,
    /// Record MAC (CBC and stream suites) or the MAC stitched into a
    /// composite cipher. `None` for AEAD suites.
    pub mac: Option<MacAlgorithm>,
}

impl CipherSuiteParams {
    /// Look up parameters for a cipher suite.
    ///
    /// With `prefer_composite`, AES-CBC suites whose MAC has a stitched
    /// implementation use it instead of separate CBC and HMAC passes.
    pub fn from_suite(suite: CipherSuite, prefer_composite: bool) -> Result<Self, TlsError> {
        use MacAlgorithm::*;

        let (cipher, mac) = match suite {
            CipherSuite::TLS_RSA_WITH_RC4_128_MD5 => (Cipher::Rc4_128, Some(HmacMd5)),
            CipherSuite::TLS_RSA_WITH_RC4_128_SHA => (Cipher::Rc4_128, Some(HmacSha1)),

            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA
            | CipherSuite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA => (Cipher::Aes128Cbc, Some(HmacSha1)),
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA
            | CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA => (Cipher::Aes256Cbc, Some(HmacSha1)),
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256
            | CipherSuite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA256
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256 => {
                (Cipher::Aes128Cbc, Some(HmacSha256))
            }
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256
            | CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA256 => {
                (Cipher::Aes256Cbc, Some(HmacSha256))
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384 => {
                (Cipher::Aes256Cbc, Some(HmacSha384))
            }

            CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => (Cipher::Aes128Gcm, None),
            CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_DHE_RSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => (Cipher::Aes256Gcm, None),
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
                (Cipher::ChaCha20Poly1305, None)
            }

            // 3DES, NULL and the signalling values never protect records here.
            _ => return Err(ConfigError::UnsupportedCipherSuite(suite.0).into()),
        };

        let cipher = if prefer_composite {
            composite_of(cipher, mac).unwrap_or(cipher)
        } else {
            cipher
        };
        Ok(Self {
            suite,
            cipher,
            mac,
        })
    }

    /// Encryption key length in bytes.
    pub fn key_len(&self) -> usize {
        self.cipher.key_material_size()
    }

    /// MAC key length in bytes (0 for AEAD).
    pub fn mac_key_len(&self) -> usize {
        self.mac.map_or(0, MacAlgorithm::key_size)
    }

    /// IV length taken from the key block.
    ///
    /// AEAD suites use it as the implicit nonce part. CBC suites still
    /// reserve a block-sized IV in the key block even though every record
    /// carries an explicit one.
    pub fn fixed_iv_len(&self) -> usize {
        match self.cipher.mode() {
            CipherMode::Aead => self.cipher.fixed_iv_size(),
            CipherMode::Cbc | CipherMode::Composite => self.cipher.block_size(),
            CipherMode::Stream => 0,
        }
    }

    /// Total key material needed from the key block.
    /// `2*mac_key + 2*enc_key + 2*iv`.
    pub fn key_block_len(&self) -> usize {
        2 * self.mac_key_len() + 2 * self.key_len() + 2 * self.fixed_iv_len()
    }
}

fn composite_of(cipher: Cipher, mac: Option<MacAlgorithm>) -> Option<Cipher> {
    match (cipher, mac?) {
        (Cipher::Aes128Cbc, MacAlgorithm::HmacSha1) => Some(Cipher::Aes128CbcHmacSha1),
        (Cipher::Aes256Cbc, MacAlgorithm::HmacSha1) => Some(Cipher::Aes256CbcHmacSha1),
        (Cipher::Aes128Cbc, MacAlgorithm::HmacSha256) => Some(Cipher::Aes128CbcHmacSha256),
        (Cipher::Aes256Cbc, MacAlgorithm::HmacSha256) => Some(Cipher::Aes256CbcHmacSha256),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_cbc_sha_params() {
        let p = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA, false)
            .unwrap();
        assert_eq!(p.cipher, Cipher::Aes128Cbc);
        assert_eq!(p.mac, Some(MacAlgorithm::HmacSha1));
        assert_eq!(p.key_len(), 16);
        assert_eq!(p.mac_key_len(), 20);
        assert_eq!(p.fixed_iv_len(), 16);
        assert_eq!(p.key_block_len(), 2 * 20 + 2 * 16 + 2 * 16);
    }

    #[test]
    fn test_gcm_and_chacha_params() {
        let p = CipherSuiteParams::from_suite(
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            false,
        )
        .unwrap();
        assert_eq!(p.cipher, Cipher::Aes256Gcm);
        assert_eq!(p.mac, None);
        assert_eq!(p.key_block_len(), 2 * 32 + 2 * 4);

        let p = CipherSuiteParams::from_suite(
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            true,
        )
        .unwrap();
        assert_eq!(p.cipher, Cipher::ChaCha20Poly1305);
        assert_eq!(p.fixed_iv_len(), 12);
    }

    #[test]
    fn test_rc4_params() {
        let p = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_RC4_128_MD5, false)
            .unwrap();
        assert_eq!(p.cipher, Cipher::Rc4_128);
        assert_eq!(p.mac, Some(MacAlgorithm::HmacMd5));
        assert_eq!(p.key_block_len(), 2 * 16 + 2 * 16);
    }

    #[test]
    fn test_prefer_composite() {
        let p = CipherSuiteParams::from_suite(
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
            true,
        )
        .unwrap();
        assert_eq!(p.cipher, Cipher::Aes128CbcHmacSha256);
        assert_eq!(p.mac, Some(MacAlgorithm::HmacSha256));

        // No stitched SHA-384 implementation: stays plain CBC
        let p = CipherSuiteParams::from_suite(
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
            true,
        )
        .unwrap();
        assert_eq!(p.cipher, Cipher::Aes256Cbc);
    }

    #[test]
    fn test_unsupported_suites() {
        for suite in [
            CipherSuite::TLS_NULL_WITH_NULL_NULL,
            CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
            CipherSuite::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
            CipherSuite::TLS_FALLBACK_SCSV,
            CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
        ] {
            let err = CipherSuiteParams::from_suite(suite, false).unwrap_err();
            assert_eq!(
                err,
                TlsError::ConfigurationError(ConfigError::UnsupportedCipherSuite(suite.0))
            );
        }
    }
}
