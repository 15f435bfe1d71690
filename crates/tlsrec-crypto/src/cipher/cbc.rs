//! AES-CBC without implicit padding.
//!
//! The record layer owns TLS padding, so every input here must already be
//! block-aligned. Each direction holds only the half of the key schedule it
//! needs.

use aes::cipher::consts::U16;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use aes::{Aes128Dec, Aes128Enc, Aes256Dec, Aes256Enc, Block};
use tlsrec_types::CryptoError;

/// AES block size (16 bytes).
pub const AES_BLOCK_SIZE: usize = 16;

/// Expanded AES round keys for one direction.
pub(crate) enum CbcKey {
    Aes128Enc(Aes128Enc),
    Aes128Dec(Aes128Dec),
    Aes256Enc(Aes256Enc),
    Aes256Dec(Aes256Dec),
}

fn key_error(expected: usize, got: usize) -> CryptoError {
    CryptoError::InvalidKeyLength { expected, got }
}

impl CbcKey {
    pub(crate) fn new_encrypt(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 => Aes128Enc::new_from_slice(key)
                .map(CbcKey::Aes128Enc)
                .map_err(|_| key_error(16, key.len())),
            32 => Aes256Enc::new_from_slice(key)
                .map(CbcKey::Aes256Enc)
                .map_err(|_| key_error(32, key.len())),
            n => Err(key_error(16, n)),
        }
    }

    pub(crate) fn new_decrypt(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 => Aes128Dec::new_from_slice(key)
                .map(CbcKey::Aes128Dec)
                .map_err(|_| key_error(16, key.len())),
            32 => Aes256Dec::new_from_slice(key)
                .map(CbcKey::Aes256Dec)
                .map_err(|_| key_error(32, key.len())),
            n => Err(key_error(16, n)),
        }
    }

    /// CBC-encrypt `data` in place.
    pub(crate) fn encrypt_in_place(&self, iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
        let iv = check_iv_and_input(iv, data.len())?;
        match self {
            CbcKey::Aes128Enc(c) => cbc_encrypt(c, iv, data),
            CbcKey::Aes256Enc(c) => cbc_encrypt(c, iv, data),
            CbcKey::Aes128Dec(_) | CbcKey::Aes256Dec(_) => {
                return Err(CryptoError::DirectionMismatch)
            }
        }
        Ok(())
    }

    /// CBC-decrypt `data` in place.
    pub(crate) fn decrypt_in_place(&self, iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
        let iv = check_iv_and_input(iv, data.len())?;
        match self {
            CbcKey::Aes128Dec(c) => cbc_decrypt(c, iv, data),
            CbcKey::Aes256Dec(c) => cbc_decrypt(c, iv, data),
            CbcKey::Aes128Enc(_) | CbcKey::Aes256Enc(_) => {
                return Err(CryptoError::DirectionMismatch)
            }
        }
        Ok(())
    }
}

fn check_iv_and_input(iv: &[u8], len: usize) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
    let iv: [u8; AES_BLOCK_SIZE] = iv.try_into().map_err(|_| CryptoError::InvalidIvLength {
        expected: AES_BLOCK_SIZE,
        got: iv.len(),
    })?;
    if len % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::InputNotAligned);
    }
    Ok(iv)
}

fn cbc_encrypt<C>(cipher: &C, iv: [u8; AES_BLOCK_SIZE], data: &mut [u8])
where
    C: BlockEncrypt + BlockSizeUser<BlockSize = U16>,
{
    let mut prev = iv;
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(Block::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }
}

fn cbc_decrypt<C>(cipher: &C, iv: [u8; AES_BLOCK_SIZE], data: &mut [u8])
where
    C: BlockDecrypt + BlockSizeUser<BlockSize = U16>,
{
    let mut prev = iv;
    let mut ct_copy = [0u8; AES_BLOCK_SIZE];
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        ct_copy.copy_from_slice(chunk);
        cipher.decrypt_block(Block::from_mut_slice(chunk));
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = ct_copy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_aes128_cbc_sp800_38a() {
        // NIST SP 800-38A F.2.1 CBC-AES128.Encrypt, first two blocks
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let iv = hex("000102030405060708090a0b0c0d0e0f");
        let pt = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let expected = hex("7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2");

        let enc = CbcKey::new_encrypt(&key).unwrap();
        let mut data = pt.clone();
        enc.encrypt_in_place(&iv, &mut data).unwrap();
        assert_eq!(data, expected);

        let dec = CbcKey::new_decrypt(&key).unwrap();
        dec.decrypt_in_place(&iv, &mut data).unwrap();
        assert_eq!(data, pt);
    }

    #[test]
    fn test_aes256_cbc_sp800_38a() {
        // NIST SP 800-38A F.2.5 CBC-AES256.Encrypt, first block
        let key = hex("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4");
        let iv = hex("000102030405060708090a0b0c0d0e0f");
        let mut data = hex("6bc1bee22e409f96e93d7e117393172a");
        let enc = CbcKey::new_encrypt(&key).unwrap();
        enc.encrypt_in_place(&iv, &mut data).unwrap();
        assert_eq!(data, hex("f58c4c04d6e5f1ba779eabfb5f7bfbd6"));
    }

    #[test]
    fn test_unaligned_input_rejected() {
        let enc = CbcKey::new_encrypt(&[0u8; 16]).unwrap();
        let mut data = [0u8; 17];
        assert_eq!(
            enc.encrypt_in_place(&[0u8; 16], &mut data).unwrap_err(),
            CryptoError::InputNotAligned
        );
    }

    #[test]
    fn test_wrong_iv_length_rejected() {
        let dec = CbcKey::new_decrypt(&[0u8; 32]).unwrap();
        let mut data = [0u8; 16];
        assert_eq!(
            dec.decrypt_in_place(&[0u8; 8], &mut data).unwrap_err(),
            CryptoError::InvalidIvLength {
                expected: 16,
                got: 8
            }
        );
    }

    #[test]
    fn test_direction_enforced() {
        let enc = CbcKey::new_encrypt(&[0u8; 16]).unwrap();
        let mut data = [0u8; 16];
        assert_eq!(
            enc.decrypt_in_place(&[0u8; 16], &mut data).unwrap_err(),
            CryptoError::DirectionMismatch
        );
    }
}
