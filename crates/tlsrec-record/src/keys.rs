//! Per-direction traffic keys and key block partitioning (RFC 5246 §6.3).

use crate::suite::CipherSuiteParams;
use crate::TlsRole;
use tlsrec_types::{ConfigError, TlsError};
use zeroize::Zeroize;

/// Raw key material for one direction of one epoch.
pub struct TrafficKeys {
    /// Record MAC key (empty for AEAD suites).
    pub mac_key: Vec<u8>,
    /// Cipher key.
    pub enc_key: Vec<u8>,
    /// Implicit IV from the key block.
    pub fixed_iv: Vec<u8>,
}

impl Drop for TrafficKeys {
    fn drop(&mut self) {
        self.mac_key.zeroize();
        self.enc_key.zeroize();
        self.fixed_iv.zeroize();
    }
}

impl TrafficKeys {
    pub fn new(mac_key: &[u8], enc_key: &[u8], fixed_iv: &[u8]) -> Self {
        Self {
            mac_key: mac_key.to_vec(),
            enc_key: enc_key.to_vec(),
            fixed_iv: fixed_iv.to_vec(),
        }
    }
}

/// Both directions' keys cut from one key block.
pub struct KeyBlock {
    pub client_write: TrafficKeys,
    pub server_write: TrafficKeys,
}

impl KeyBlock {
    /// Partition a key block:
    ///
    /// ```text
    /// client_write_MAC_key[mac_key_len] || server_write_MAC_key[mac_key_len] ||
    /// client_write_key[enc_key_len]     || server_write_key[enc_key_len] ||
    /// client_write_IV[iv_len]           || server_write_IV[iv_len]
    /// ```
    ///
    /// Trailing bytes beyond `key_block_len()` are ignored.
    pub fn from_key_block(params: &CipherSuiteParams, key_block: &[u8]) -> Result<Self, TlsError> {
        let need = params.key_block_len();
        if key_block.len() < need {
            return Err(ConfigError::InvalidKeyLength {
                expected: need,
                got: key_block.len(),
            }
            .into());
        }

        let (client_mac, rest) = key_block.split_at(params.mac_key_len());
        let (server_mac, rest) = rest.split_at(params.mac_key_len());
        let (client_key, rest) = rest.split_at(params.key_len());
        let (server_key, rest) = rest.split_at(params.key_len());
        let (client_iv, rest) = rest.split_at(params.fixed_iv_len());
        let server_iv = &rest[..params.fixed_iv_len()];

        Ok(Self {
            client_write: TrafficKeys::new(client_mac, client_key, client_iv),
            server_write: TrafficKeys::new(server_mac, server_key, server_iv),
        })
    }

    /// Keys this endpoint encrypts with.
    pub fn write_keys(&self, role: TlsRole) -> &TrafficKeys {
        match role {
            TlsRole::Client => &self.client_write,
            TlsRole::Server => &self.server_write,
        }
    }

    /// Keys this endpoint decrypts with.
    pub fn read_keys(&self, role: TlsRole) -> &TrafficKeys {
        match role {
            TlsRole::Client => &self.server_write,
            TlsRole::Server => &self.client_write,
        }
    }
}
