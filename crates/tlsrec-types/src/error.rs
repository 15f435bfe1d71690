/// Symmetric primitive errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // Key setup errors
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length: expected {expected}, got {got}")]
    InvalidIvLength { expected: usize, got: usize },
    #[error("invalid additional data length: expected {expected}, got {got}")]
    InvalidAadLength { expected: usize, got: usize },
    #[error("key not set")]
    KeyNotSet,
    #[error("key already set")]
    KeyAlreadySet,
    #[error("key material destroyed")]
    KeyDestroyed,
    #[error("key is bound to the other direction")]
    DirectionMismatch,
    #[error("operation not supported by this cipher")]
    NotSupported,

    // Buffer errors
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input length is not a multiple of the block size")]
    InputNotAligned,

    // Primitive failures
    #[error("encryption failed")]
    EncryptionFailure,
    #[error("decryption failed")]
    DecryptionFailure,
    #[error("random number generation failed")]
    RandomFailure,
}

/// Caller-side configuration errors. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid fixed iv length: expected {expected}, got {got}")]
    InvalidIvLength { expected: usize, got: usize },
    #[error("unsupported cipher suite 0x{0:04x}")]
    UnsupportedCipherSuite(u16),
    #[error("invalid maximum fragment length: {0}")]
    InvalidFragmentLength(usize),
}

/// Record layer errors. Every variant is terminal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlsError {
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),
    #[error("record too large: {len} bytes exceeds {max}")]
    RecordTooLarge { len: usize, max: usize },
    #[error("record decode error: {0}")]
    RecordDecodeError(String),
    /// Padding or MAC check failed. Deliberately carries no detail.
    #[error("bad record MAC")]
    CryptographicFailure,
    #[error("output buffer too small: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("sequence number overflow")]
    SequenceOverflow,
    #[error("crypto error: {0}")]
    CryptoError(CryptoError),
}

impl From<CryptoError> for TlsError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyLength { expected, got } => {
                TlsError::ConfigurationError(ConfigError::InvalidKeyLength { expected, got })
            }
            CryptoError::BufferTooSmall { need, got } => TlsError::BufferTooSmall { need, got },
            other => TlsError::CryptoError(other),
        }
    }
}

impl TlsError {
    /// Returns true for errors caused by the caller's configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, TlsError::ConfigurationError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_length_maps_to_configuration_error() {
        let err: TlsError = CryptoError::InvalidKeyLength {
            expected: 16,
            got: 15,
        }
        .into();
        assert!(err.is_configuration_error());
        assert_eq!(
            err,
            TlsError::ConfigurationError(ConfigError::InvalidKeyLength {
                expected: 16,
                got: 15
            })
        );
    }

    #[test]
    fn test_buffer_error_maps_to_record_buffer_error() {
        let err: TlsError = CryptoError::BufferTooSmall { need: 32, got: 16 }.into();
        assert_eq!(err, TlsError::BufferTooSmall { need: 32, got: 16 });
    }

    #[test]
    fn test_primitive_failure_is_wrapped() {
        let err: TlsError = CryptoError::EncryptionFailure.into();
        assert_eq!(err, TlsError::CryptoError(CryptoError::EncryptionFailure));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_cryptographic_failure_message_is_generic() {
        assert_eq!(TlsError::CryptographicFailure.to_string(), "bad record MAC");
    }

    #[test]
    fn test_unsupported_suite_display() {
        let err = ConfigError::UnsupportedCipherSuite(0x000A);
        assert_eq!(err.to_string(), "unsupported cipher suite 0x000a");
    }
}
