//! AEAD contexts: AES-GCM and ChaCha20-Poly1305.
//!
//! Nonce construction is the record layer's job; this module takes the full
//! 12-byte nonce and writes `ciphertext || tag`.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use tlsrec_types::CryptoError;

/// Nonce length shared by every supported AEAD.
pub const AEAD_NONCE_SIZE: usize = 12;

/// Authentication tag length shared by every supported AEAD.
pub const AEAD_TAG_SIZE: usize = 16;

pub(crate) enum AeadKey {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

macro_rules! with_aead {
    ($key:expr, $a:ident => $body:expr) => {
        match $key {
            AeadKey::Aes128Gcm($a) => $body,
            AeadKey::Aes256Gcm($a) => $body,
            AeadKey::ChaCha20Poly1305($a) => $body,
        }
    };
}

impl AeadKey {
    pub(crate) fn aes_gcm(key: &[u8]) -> Result<Self, CryptoError> {
        let bad_len = |expected| CryptoError::InvalidKeyLength {
            expected,
            got: key.len(),
        };
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|k| AeadKey::Aes128Gcm(Box::new(k)))
                .map_err(|_| bad_len(16)),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|k| AeadKey::Aes256Gcm(Box::new(k)))
                .map_err(|_| bad_len(32)),
            _ => Err(bad_len(16)),
        }
    }

    pub(crate) fn chacha20_poly1305(key: &[u8]) -> Result<Self, CryptoError> {
        ChaCha20Poly1305::new_from_slice(key)
            .map(|k| AeadKey::ChaCha20Poly1305(Box::new(k)))
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                got: key.len(),
            })
    }

    /// Encrypt `data` in place and write the tag into `tag`.
    pub(crate) fn seal_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &mut [u8],
    ) -> Result<(), CryptoError> {
        let nonce = check_nonce(nonce)?;
        if tag.len() != AEAD_TAG_SIZE {
            return Err(CryptoError::BufferTooSmall {
                need: AEAD_TAG_SIZE,
                got: tag.len(),
            });
        }
        let t = with_aead!(self, k => k.encrypt_in_place_detached(nonce, aad, data))
            .map_err(|_| CryptoError::EncryptionFailure)?;
        tag.copy_from_slice(&t);
        Ok(())
    }

    /// Verify `tag` and decrypt `data` in place. On failure `data` is left
    /// untouched by the underlying primitive.
    pub(crate) fn open_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8],
    ) -> Result<(), CryptoError> {
        let nonce = check_nonce(nonce)?;
        if tag.len() != AEAD_TAG_SIZE {
            return Err(CryptoError::DecryptionFailure);
        }
        let tag = GenericArray::from_slice(tag);
        with_aead!(self, k => k.decrypt_in_place_detached(nonce, aad, data, tag))
            .map_err(|_| CryptoError::DecryptionFailure)
    }
}

fn check_nonce(nonce: &[u8]) -> Result<&GenericArray<u8, aes_gcm::aead::consts::U12>, CryptoError> {
    if nonce.len() != AEAD_NONCE_SIZE {
        return Err(CryptoError::InvalidIvLength {
            expected: AEAD_NONCE_SIZE,
            got: nonce.len(),
        });
    }
    Ok(GenericArray::from_slice(nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes128_gcm_nist_case2() {
        // McGrew-Viega GCM test case 2: zero key, zero nonce, one zero block
        let key = AeadKey::aes_gcm(&[0u8; 16]).unwrap();
        let mut data = [0u8; 16];
        let mut tag = [0u8; 16];
        key.seal_in_place(&[0u8; 12], &[], &mut data, &mut tag).unwrap();
        assert_eq!(
            data,
            [
                0x03, 0x88, 0xda, 0xce, 0x60, 0xb6, 0xa3, 0x92, 0xf3, 0x28, 0xc2, 0xb9, 0x71, 0xb2,
                0xfe, 0x78
            ]
        );
        assert_eq!(
            tag,
            [
                0xab, 0x6e, 0x47, 0xd4, 0x2c, 0xec, 0x13, 0xbd, 0xf5, 0x3a, 0x67, 0xb2, 0x12, 0x57,
                0xbd, 0xdf
            ]
        );
        key.open_in_place(&[0u8; 12], &[], &mut data, &tag).unwrap();
        assert_eq!(data, [0u8; 16]);
    }

    #[test]
    fn test_chacha20_poly1305_roundtrip_and_tamper() {
        let key = AeadKey::chacha20_poly1305(&[0x42; 32]).unwrap();
        let nonce = [0x07u8; 12];
        let mut data = *b"hello ChaCha20";
        let mut tag = [0u8; 16];
        key.seal_in_place(&nonce, b"aad", &mut data, &mut tag).unwrap();
        assert_ne!(&data, b"hello ChaCha20");

        let mut tampered = data;
        tampered[0] ^= 1;
        assert_eq!(
            key.open_in_place(&nonce, b"aad", &mut tampered, &tag)
                .unwrap_err(),
            CryptoError::DecryptionFailure
        );
        assert_eq!(
            key.open_in_place(&nonce, b"AAD", &mut data.clone(), &tag)
                .unwrap_err(),
            CryptoError::DecryptionFailure
        );

        key.open_in_place(&nonce, b"aad", &mut data, &tag).unwrap();
        assert_eq!(&data, b"hello ChaCha20");
    }

    #[test]
    fn test_key_and_nonce_lengths() {
        assert!(AeadKey::aes_gcm(&[0u8; 24]).is_err());
        assert!(AeadKey::chacha20_poly1305(&[0u8; 16]).is_err());
        let key = AeadKey::aes_gcm(&[0u8; 32]).unwrap();
        let mut tag = [0u8; 16];
        assert_eq!(
            key.seal_in_place(&[0u8; 8], &[], &mut [], &mut tag)
                .unwrap_err(),
            CryptoError::InvalidIvLength {
                expected: 12,
                got: 8
            }
        );
    }
}
