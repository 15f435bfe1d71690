//! Record ciphers and per-epoch session key material.
//!
//! [`Cipher`] names a record cipher and its fixed sizes. [`Cipher::init`]
//! yields an unbound [`SessionKey`], which is then bound to exactly one
//! direction and one raw key, used for one epoch, and destroyed.

mod aead;
mod cbc;
mod composite;
mod stream;

pub use aead::{AEAD_NONCE_SIZE, AEAD_TAG_SIZE};
pub use cbc::AES_BLOCK_SIZE;
pub use composite::COMPOSITE_AAD_SIZE;

use crate::mac::{MacAlgorithm, RecordMac};
use aead::AeadKey;
use cbc::CbcKey;
use composite::CompositeKey;
use stream::Rc4;
use tlsrec_types::CryptoError;
use zeroize::Zeroize;

/// How a cipher protects a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// Block cipher chaining; the record layer MACs and pads.
    Cbc,
    /// Keystream; the record layer MACs.
    Stream,
    /// Authenticated encryption with a tag.
    Aead,
    /// Block cipher with a stitched MAC; MAC and padding happen inside.
    Composite,
}

/// The direction a session key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Record ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Cipher {
    Rc4_128,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
    Aes128CbcHmacSha1,
    Aes256CbcHmacSha1,
    Aes128CbcHmacSha256,
    Aes256CbcHmacSha256,
}

impl Cipher {
    pub const fn mode(self) -> CipherMode {
        match self {
            Cipher::Rc4_128 => CipherMode::Stream,
            Cipher::Aes128Cbc | Cipher::Aes256Cbc => CipherMode::Cbc,
            Cipher::Aes128Gcm | Cipher::Aes256Gcm | Cipher::ChaCha20Poly1305 => CipherMode::Aead,
            Cipher::Aes128CbcHmacSha1
            | Cipher::Aes256CbcHmacSha1
            | Cipher::Aes128CbcHmacSha256
            | Cipher::Aes256CbcHmacSha256 => CipherMode::Composite,
        }
    }

    /// Raw key length in bytes.
    pub const fn key_material_size(self) -> usize {
        match self {
            Cipher::Rc4_128
            | Cipher::Aes128Cbc
            | Cipher::Aes128Gcm
            | Cipher::Aes128CbcHmacSha1
            | Cipher::Aes128CbcHmacSha256 => 16,
            Cipher::Aes256Cbc
            | Cipher::Aes256Gcm
            | Cipher::ChaCha20Poly1305
            | Cipher::Aes256CbcHmacSha1
            | Cipher::Aes256CbcHmacSha256 => 32,
        }
    }

    pub const fn block_size(self) -> usize {
        match self.mode() {
            CipherMode::Cbc | CipherMode::Composite => AES_BLOCK_SIZE,
            CipherMode::Stream | CipherMode::Aead => 1,
        }
    }

    /// Explicit per-record IV (or nonce part) carried on the wire.
    pub const fn record_iv_size(self) -> usize {
        match self {
            Cipher::Aes128Gcm | Cipher::Aes256Gcm => 8,
            Cipher::ChaCha20Poly1305 | Cipher::Rc4_128 => 0,
            _ => AES_BLOCK_SIZE,
        }
    }

    /// Implicit IV taken from the key block.
    pub const fn fixed_iv_size(self) -> usize {
        match self {
            Cipher::Aes128Gcm | Cipher::Aes256Gcm => 4,
            Cipher::ChaCha20Poly1305 => 12,
            _ => 0,
        }
    }

    /// AEAD tag length; zero for every other mode.
    pub const fn tag_size(self) -> usize {
        match self.mode() {
            CipherMode::Aead => AEAD_TAG_SIZE,
            _ => 0,
        }
    }

    /// The MAC stitched into a composite cipher.
    pub const fn composite_mac(self) -> Option<MacAlgorithm> {
        match self {
            Cipher::Aes128CbcHmacSha1 | Cipher::Aes256CbcHmacSha1 => Some(MacAlgorithm::HmacSha1),
            Cipher::Aes128CbcHmacSha256 | Cipher::Aes256CbcHmacSha256 => {
                Some(MacAlgorithm::HmacSha256)
            }
            _ => None,
        }
    }

    /// Bytes `encrypt` writes for `input_len` bytes of input.
    pub const fn encrypted_len(self, input_len: usize) -> usize {
        match self.composite_mac() {
            Some(mac) => composite::padded_len(input_len, mac.output_size()),
            None => input_len + self.tag_size(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Cipher::Rc4_128 => "RC4-128",
            Cipher::Aes128Cbc => "AES-128-CBC",
            Cipher::Aes256Cbc => "AES-256-CBC",
            Cipher::Aes128Gcm => "AES-128-GCM",
            Cipher::Aes256Gcm => "AES-256-GCM",
            Cipher::ChaCha20Poly1305 => "CHACHA20-POLY1305",
            Cipher::Aes128CbcHmacSha1 => "AES-128-CBC-HMAC-SHA1",
            Cipher::Aes256CbcHmacSha1 => "AES-256-CBC-HMAC-SHA1",
            Cipher::Aes128CbcHmacSha256 => "AES-128-CBC-HMAC-SHA256",
            Cipher::Aes256CbcHmacSha256 => "AES-256-CBC-HMAC-SHA256",
        }
    }

    /// Prepare an unbound key context. Never fails.
    pub fn init(self) -> SessionKey {
        SessionKey {
            cipher: self,
            direction: None,
            state: KeyState::Uninitialized,
        }
    }
}

enum KeyState {
    Uninitialized,
    Cbc(CbcKey),
    Stream(Rc4),
    Aead(AeadKey),
    Composite(CompositeKey),
    Destroyed,
}

impl KeyState {
    fn name(&self) -> &'static str {
        match self {
            KeyState::Uninitialized => "uninitialized",
            KeyState::Cbc(_) => "cbc",
            KeyState::Stream(_) => "stream",
            KeyState::Aead(_) => "aead",
            KeyState::Composite(_) => "composite",
            KeyState::Destroyed => "destroyed",
        }
    }
}

/// Key material for one direction of one epoch.
///
/// Not `Clone`: the context moves with its owner and is zeroized when
/// destroyed or dropped.
pub struct SessionKey {
    cipher: Cipher,
    direction: Option<Direction>,
    state: KeyState,
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("cipher", &self.cipher)
            .field("direction", &self.direction)
            .field("state", &self.state.name())
            .finish()
    }
}

impl SessionKey {
    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, KeyState::Destroyed)
    }

    fn check_live(&self) -> Result<(), CryptoError> {
        debug_assert!(!self.is_destroyed(), "session key used after destroy_key");
        if self.is_destroyed() {
            return Err(CryptoError::KeyDestroyed);
        }
        Ok(())
    }

    /// Bind `raw_key` for encryption. The key length must equal
    /// `key_material_size()`.
    pub fn get_encryption_key(&mut self, raw_key: &[u8]) -> Result<(), CryptoError> {
        self.bind(Direction::Encrypt, raw_key)
    }

    /// Bind `raw_key` for decryption.
    pub fn get_decryption_key(&mut self, raw_key: &[u8]) -> Result<(), CryptoError> {
        self.bind(Direction::Decrypt, raw_key)
    }

    fn bind(&mut self, dir: Direction, raw_key: &[u8]) -> Result<(), CryptoError> {
        self.check_live()?;
        if self.direction.is_some() {
            return Err(CryptoError::KeyAlreadySet);
        }
        let expected = self.cipher.key_material_size();
        if raw_key.len() != expected {
            return Err(CryptoError::InvalidKeyLength {
                expected,
                got: raw_key.len(),
            });
        }

        let new_cbc = |key: &[u8]| match dir {
            Direction::Encrypt => CbcKey::new_encrypt(key),
            Direction::Decrypt => CbcKey::new_decrypt(key),
        };
        let state = match self.cipher.mode() {
            CipherMode::Cbc => KeyState::Cbc(new_cbc(raw_key)?),
            CipherMode::Stream => KeyState::Stream(Rc4::new(raw_key)),
            CipherMode::Aead => KeyState::Aead(match self.cipher {
                Cipher::ChaCha20Poly1305 => AeadKey::chacha20_poly1305(raw_key)?,
                _ => AeadKey::aes_gcm(raw_key)?,
            }),
            CipherMode::Composite => {
                let cbc = new_cbc(raw_key)?;
                let mac = match std::mem::replace(&mut self.state, KeyState::Uninitialized) {
                    KeyState::Composite(ck) => ck.mac,
                    _ => None,
                };
                KeyState::Composite(CompositeKey {
                    cbc: Some(cbc),
                    mac,
                })
            }
        };
        self.state = state;
        self.direction = Some(dir);
        Ok(())
    }

    /// Bind the stitched MAC key of a composite cipher. Other modes do not
    /// carry a MAC and return `NotSupported`.
    pub fn set_mac_key(&mut self, alg: MacAlgorithm, raw_key: &[u8]) -> Result<(), CryptoError> {
        self.check_live()?;
        if self.cipher.composite_mac() != Some(alg) {
            return Err(CryptoError::NotSupported);
        }
        let mac = RecordMac::new(alg, raw_key)?;
        match &mut self.state {
            KeyState::Composite(ck) if ck.mac.is_some() => Err(CryptoError::KeyAlreadySet),
            KeyState::Composite(ck) => {
                ck.mac = Some(mac);
                Ok(())
            }
            state => {
                *state = KeyState::Composite(CompositeKey {
                    cbc: None,
                    mac: Some(mac),
                });
                Ok(())
            }
        }
    }

    fn check_direction(&self, want: Direction) -> Result<(), CryptoError> {
        self.check_live()?;
        match self.direction {
            None => Err(CryptoError::KeyNotSet),
            Some(d) if d != want => Err(CryptoError::DirectionMismatch),
            Some(_) => Ok(()),
        }
    }

    /// Encrypt `input` into `out` and return the bytes written.
    ///
    /// `iv` is the per-record IV (CBC, composite) or the full nonce (AEAD);
    /// the caller must never repeat it under one key. `aad` is the AEAD
    /// additional data or, for composite ciphers, `seq || type || version`.
    /// Capacity is checked before the primitive runs.
    pub fn encrypt(
        &mut self,
        iv: &[u8],
        aad: &[u8],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError> {
        self.check_direction(Direction::Encrypt)?;
        let need = self.cipher.encrypted_len(input.len());
        if out.len() < need {
            return Err(CryptoError::BufferTooSmall {
                need,
                got: out.len(),
            });
        }
        let n = input.len();
        match &mut self.state {
            KeyState::Cbc(key) => {
                out[..n].copy_from_slice(input);
                key.encrypt_in_place(iv, &mut out[..n])?;
                Ok(n)
            }
            KeyState::Stream(rc4) => {
                out[..n].copy_from_slice(input);
                rc4.apply_keystream(&mut out[..n]);
                Ok(n)
            }
            KeyState::Aead(key) => {
                out[..n].copy_from_slice(input);
                let (data, tag) = out[..need].split_at_mut(n);
                key.seal_in_place(iv, aad, data, tag)?;
                Ok(need)
            }
            KeyState::Composite(ck) => ck.seal(iv, aad, input, out),
            KeyState::Uninitialized | KeyState::Destroyed => Err(CryptoError::KeyNotSet),
        }
    }

    /// Decrypt `input` into `out` and return the bytes of plaintext.
    ///
    /// For CBC this only removes the block chaining; padding and MAC checks
    /// belong to the caller. AEAD and composite ciphers authenticate here and
    /// fail with `DecryptionFailure`, wiping the output.
    pub fn decrypt(
        &mut self,
        iv: &[u8],
        aad: &[u8],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError> {
        self.check_direction(Direction::Decrypt)?;
        let tag_len = self.cipher.tag_size();
        if input.len() < tag_len {
            return Err(CryptoError::DecryptionFailure);
        }
        let need = input.len() - tag_len;
        if out.len() < need {
            return Err(CryptoError::BufferTooSmall {
                need,
                got: out.len(),
            });
        }
        match &mut self.state {
            KeyState::Cbc(key) => {
                out[..need].copy_from_slice(input);
                key.decrypt_in_place(iv, &mut out[..need])?;
                Ok(need)
            }
            KeyState::Stream(rc4) => {
                out[..need].copy_from_slice(input);
                rc4.apply_keystream(&mut out[..need]);
                Ok(need)
            }
            KeyState::Aead(key) => {
                let (ct, tag) = input.split_at(need);
                out[..need].copy_from_slice(ct);
                if let Err(e) = key.open_in_place(iv, aad, &mut out[..need], tag) {
                    out[..need].zeroize();
                    return Err(e);
                }
                Ok(need)
            }
            KeyState::Composite(ck) => ck.open(iv, aad, input, out),
            KeyState::Uninitialized | KeyState::Destroyed => Err(CryptoError::KeyNotSet),
        }
    }

    /// Zeroize and release the context. Safe to call more than once.
    pub fn destroy_key(&mut self) {
        if self.is_destroyed() {
            return;
        }
        log::trace!("destroying {} {:?} key", self.cipher.name(), self.direction);
        // Each context zeroizes its own schedule when dropped.
        self.state = KeyState::Destroyed;
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.destroy_key();
    }
}
