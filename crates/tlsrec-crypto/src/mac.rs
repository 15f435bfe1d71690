//! TLS record MAC (RFC 5246 §6.2.3.1) and constant-time CBC record checks.
//!
//! MAC = HMAC(mac_key, seq(8) || type(1) || version(2) || length(2) || fragment)

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};
use subtle::{
    Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater, ConstantTimeLess,
};
use tlsrec_types::CryptoError;
use zeroize::Zeroize;

/// Largest MAC output of any supported algorithm (HMAC-SHA384).
pub const MAX_MAC_LEN: usize = 48;

/// Largest TLS CBC padding: 255 padding bytes plus the length byte.
pub const MAX_PADDING_LEN: usize = 256;

/// seq(8) || type(1) || version(2) || length(2)
const MAC_HEADER_LEN: usize = 13;

/// Largest hash block (SHA-384).
const MAX_HASH_BLOCK: usize = 128;

static FILLER: [u8; MAX_HASH_BLOCK] = [0u8; MAX_HASH_BLOCK];

/// Record MAC algorithms used by CBC, stream and composite suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    HmacMd5,
    HmacSha1,
    HmacSha256,
    HmacSha384,
}

impl MacAlgorithm {
    /// MAC output size in bytes.
    pub const fn output_size(self) -> usize {
        match self {
            MacAlgorithm::HmacMd5 => 16,
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha256 => 32,
            MacAlgorithm::HmacSha384 => 48,
        }
    }

    /// MAC key size in bytes (TLS uses keys as long as the digest).
    pub const fn key_size(self) -> usize {
        self.output_size()
    }

    /// Compression block size of the underlying hash.
    pub const fn hash_block_size(self) -> usize {
        match self {
            MacAlgorithm::HmacSha384 => 128,
            _ => 64,
        }
    }

    /// Width of the message-length field in the final hash block.
    const fn length_field_size(self) -> usize {
        match self {
            MacAlgorithm::HmacSha384 => 16,
            _ => 8,
        }
    }
}

#[cfg(test)]
thread_local! {
    static COMPRESSIONS: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

/// Hash compressions performed on this thread since the last reset.
#[cfg(test)]
pub(crate) fn take_compressions() -> u64 {
    COMPRESSIONS.with(|c| c.replace(0))
}

#[cfg(test)]
fn count_compressions(n: u64) {
    COMPRESSIONS.with(|c| c.set(c.get() + n));
}

#[derive(Clone)]
enum HmacInner {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
}

#[derive(Clone)]
struct HmacState {
    inner: HmacInner,
    /// Inner-hash message bytes absorbed, for compression accounting.
    #[cfg(test)]
    absorbed: u64,
    #[cfg(test)]
    alg: MacAlgorithm,
}

impl HmacState {
    fn new(alg: MacAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let inner = match alg {
            MacAlgorithm::HmacMd5 => Hmac::<Md5>::new_from_slice(key).map(HmacInner::Md5),
            MacAlgorithm::HmacSha1 => Hmac::<Sha1>::new_from_slice(key).map(HmacInner::Sha1),
            MacAlgorithm::HmacSha256 => {
                Hmac::<Sha256>::new_from_slice(key).map(HmacInner::Sha256)
            }
            MacAlgorithm::HmacSha384 => {
                Hmac::<Sha384>::new_from_slice(key).map(HmacInner::Sha384)
            }
        };
        let inner = inner.map_err(|_| CryptoError::InvalidKeyLength {
            expected: alg.key_size(),
            got: key.len(),
        })?;
        Ok(Self {
            inner,
            #[cfg(test)]
            absorbed: 0,
            #[cfg(test)]
            alg,
        })
    }

    fn update(&mut self, data: &[u8]) {
        #[cfg(test)]
        {
            let block = self.alg.hash_block_size() as u64;
            let before = self.absorbed / block;
            self.absorbed += data.len() as u64;
            count_compressions(self.absorbed / block - before);
        }
        match &mut self.inner {
            HmacInner::Md5(h) => h.update(data),
            HmacInner::Sha1(h) => h.update(data),
            HmacInner::Sha256(h) => h.update(data),
            HmacInner::Sha384(h) => h.update(data),
        }
    }

    /// `out` must be exactly the output size.
    fn finalize_into(self, out: &mut [u8]) {
        #[cfg(test)]
        {
            let block = self.alg.hash_block_size() as u64;
            let tail = self.absorbed % block + 1 + self.alg.length_field_size() as u64;
            let inner_final = if tail > block { 2 } else { 1 };
            // plus the single outer compression
            count_compressions(inner_final + 1);
        }
        match self.inner {
            HmacInner::Md5(h) => out.copy_from_slice(&h.finalize().into_bytes()),
            HmacInner::Sha1(h) => out.copy_from_slice(&h.finalize().into_bytes()),
            HmacInner::Sha256(h) => out.copy_from_slice(&h.finalize().into_bytes()),
            HmacInner::Sha384(h) => out.copy_from_slice(&h.finalize().into_bytes()),
        }
    }
}

/// A keyed record MAC for one direction of one epoch.
///
/// The keyed HMAC state is prepared once and cloned per record.
pub struct RecordMac {
    alg: MacAlgorithm,
    keyed: HmacState,
}

impl RecordMac {
    /// Key a record MAC. The key must be exactly `alg.key_size()` bytes.
    pub fn new(alg: MacAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != alg.key_size() {
            return Err(CryptoError::InvalidKeyLength {
                expected: alg.key_size(),
                got: key.len(),
            });
        }
        Ok(Self {
            alg,
            keyed: HmacState::new(alg, key)?,
        })
    }

    pub fn algorithm(&self) -> MacAlgorithm {
        self.alg
    }

    pub fn output_size(&self) -> usize {
        self.alg.output_size()
    }

    fn start(&self, seq: u64, content_type: u8, version: u16, length: usize) -> HmacState {
        let mut h = self.keyed.clone();
        h.update(&seq.to_be_bytes());
        h.update(&[content_type]);
        h.update(&version.to_be_bytes());
        h.update(&(length as u16).to_be_bytes());
        h
    }

    /// Compute the MAC of `fragment` into the first `output_size()` bytes of `out`.
    pub fn compute(
        &self,
        seq: u64,
        content_type: u8,
        version: u16,
        fragment: &[u8],
        out: &mut [u8],
    ) -> Result<(), CryptoError> {
        let mac_len = self.output_size();
        if out.len() < mac_len {
            return Err(CryptoError::BufferTooSmall {
                need: mac_len,
                got: out.len(),
            });
        }
        let mut h = self.start(seq, content_type, version, fragment.len());
        h.update(fragment);
        h.finalize_into(&mut out[..mac_len]);
        Ok(())
    }

    /// Constant-time comparison of `received` against the MAC of `fragment`.
    pub fn verify(
        &self,
        seq: u64,
        content_type: u8,
        version: u16,
        fragment: &[u8],
        received: &[u8],
    ) -> Choice {
        let mac_len = self.output_size();
        let mut expected = [0u8; MAX_MAC_LEN];
        let mut h = self.start(seq, content_type, version, fragment.len());
        h.update(fragment);
        h.finalize_into(&mut expected[..mac_len]);
        let ok = received.ct_eq(&expected[..mac_len]);
        expected.zeroize();
        ok
    }

    /// Verify a decrypted CBC body `content || mac || padding || padding_length`.
    ///
    /// Returns the combined padding-and-MAC validity together with the content
    /// length; the length is meaningful only when the choice is set. The work
    /// done does not depend on the padding length byte: padding is scanned over
    /// the full 256-byte window, the received MAC is gathered with masked
    /// selects, and the HMAC is continued over the unused region so the hashed
    /// length always equals the largest possible content length. The real
    /// MAC's final padding takes one or two compressions depending on the
    /// content length; the continuation absorbs one extra hash block exactly
    /// when it takes one, so the compression count is fixed by `decrypted.len()`.
    pub fn verify_padded(
        &self,
        seq: u64,
        content_type: u8,
        version: u16,
        decrypted: &[u8],
    ) -> (Choice, usize) {
        let mac_len = self.output_size();
        let len = decrypted.len();
        if len < mac_len + 1 {
            return (Choice::from(0), 0);
        }
        let max_content = len - mac_len - 1;

        let pad_len = u64::from(decrypted[len - 1]);
        let good_len = !pad_len.ct_gt(&(max_content as u64));
        let eff_pad = u64::conditional_select(&0, &pad_len, good_len);
        let content_len = max_content - eff_pad as usize;

        let mut pad_ok = good_len;
        for i in 0..len.min(MAX_PADDING_LEN) {
            let b = decrypted[len - 1 - i];
            let in_pad = (i as u64).ct_lt(&(eff_pad + 1));
            pad_ok &= !in_pad | b.ct_eq(&(eff_pad as u8));
        }

        let mut expected = [0u8; MAX_MAC_LEN];
        let mut sink = [0u8; MAX_MAC_LEN];
        let block = self.alg.hash_block_size();
        let tail = ((MAC_HEADER_LEN + content_len) & (block - 1)) as u64;
        let final_len = tail + 1 + self.alg.length_field_size() as u64;
        let two_final = final_len.ct_gt(&(block as u64));
        let filler_len = u64::conditional_select(&(block as u64), &0, two_final) as usize;

        let mut h = self.start(seq, content_type, version, content_len);
        h.update(&decrypted[..content_len]);
        let mut dummy = h.clone();
        h.finalize_into(&mut expected[..mac_len]);
        dummy.update(&decrypted[content_len..max_content]);
        dummy.update(&FILLER[..filler_len]);
        dummy.finalize_into(&mut sink[..mac_len]);
        std::hint::black_box(&sink);

        let mut received = [0u8; MAX_MAC_LEN];
        let scan_start = len.saturating_sub(mac_len + MAX_PADDING_LEN);
        for (j, &b) in decrypted[..len - 1].iter().enumerate().skip(scan_start) {
            let offset = (j as u64).wrapping_sub(content_len as u64);
            for (i, r) in received[..mac_len].iter_mut().enumerate() {
                r.conditional_assign(&b, offset.ct_eq(&(i as u64)));
            }
        }
        let mac_ok = received[..mac_len].ct_eq(&expected[..mac_len]);

        expected.zeroize();
        received.zeroize();
        (pad_ok & mac_ok, content_len)
    }
}
