//! Stitched AES-CBC + HMAC ("composite") cipher.
//!
//! The composite context MACs, pads and encrypts in one call, so the record
//! layer hands it the bare content plus `seq(8) || type(1) || version(2)`.

use super::cbc::{CbcKey, AES_BLOCK_SIZE};
use crate::mac::RecordMac;
use tlsrec_types::CryptoError;
use zeroize::Zeroize;

/// Additional data a composite cipher expects: seq(8) + type(1) + version(2).
pub const COMPOSITE_AAD_SIZE: usize = 11;

/// Cipher half and MAC half may be bound in either order.
pub(crate) struct CompositeKey {
    pub(crate) cbc: Option<CbcKey>,
    pub(crate) mac: Option<RecordMac>,
}

struct MacInput {
    seq: u64,
    content_type: u8,
    version: u16,
}

fn parse_aad(aad: &[u8]) -> Result<MacInput, CryptoError> {
    if aad.len() != COMPOSITE_AAD_SIZE {
        return Err(CryptoError::InvalidAadLength {
            expected: COMPOSITE_AAD_SIZE,
            got: aad.len(),
        });
    }
    let mut seq = [0u8; 8];
    seq.copy_from_slice(&aad[..8]);
    Ok(MacInput {
        seq: u64::from_be_bytes(seq),
        content_type: aad[8],
        version: u16::from_be_bytes([aad[9], aad[10]]),
    })
}

/// Length of `content || mac || padding` rounded up to the block size.
pub(crate) const fn padded_len(content_len: usize, mac_len: usize) -> usize {
    (content_len + mac_len + 1).div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE
}

impl CompositeKey {
    fn parts(&self) -> Result<(&CbcKey, &RecordMac), CryptoError> {
        match (&self.cbc, &self.mac) {
            (Some(cbc), Some(mac)) => Ok((cbc, mac)),
            _ => Err(CryptoError::KeyNotSet),
        }
    }

    /// MAC, pad and encrypt `input` into `out`. Returns the ciphertext length.
    pub(crate) fn seal(
        &self,
        iv: &[u8],
        aad: &[u8],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let (cbc, mac) = self.parts()?;
        let hdr = parse_aad(aad)?;
        let mac_len = mac.output_size();
        let total = padded_len(input.len(), mac_len);
        if out.len() < total {
            return Err(CryptoError::BufferTooSmall {
                need: total,
                got: out.len(),
            });
        }

        let n = input.len();
        out[..n].copy_from_slice(input);
        mac.compute(
            hdr.seq,
            hdr.content_type,
            hdr.version,
            input,
            &mut out[n..n + mac_len],
        )?;
        let pad_len = (total - n - mac_len - 1) as u8;
        out[n + mac_len..total].fill(pad_len);
        cbc.encrypt_in_place(iv, &mut out[..total])?;
        Ok(total)
    }

    /// Decrypt `input` into `out`, then check padding and MAC in constant
    /// time. Returns the content length.
    pub(crate) fn open(
        &self,
        iv: &[u8],
        aad: &[u8],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let (cbc, mac) = self.parts()?;
        let hdr = parse_aad(aad)?;
        let n = input.len();
        if out.len() < n {
            return Err(CryptoError::BufferTooSmall {
                need: n,
                got: out.len(),
            });
        }
        if n < padded_len(0, mac.output_size()) || n % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::DecryptionFailure);
        }

        out[..n].copy_from_slice(input);
        cbc.decrypt_in_place(iv, &mut out[..n])?;
        let (ok, content_len) =
            mac.verify_padded(hdr.seq, hdr.content_type, hdr.version, &out[..n]);
        if !bool::from(ok) {
            out[..n].zeroize();
            return Err(CryptoError::DecryptionFailure);
        }
        Ok(content_len)
    }
}
