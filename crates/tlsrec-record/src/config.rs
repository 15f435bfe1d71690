//! Record layer configuration with builder pattern.

use tlsrec_types::{ConfigError, ProtocolVersion, TlsError, MAXIMUM_FRAGMENT_LENGTH};

/// Record layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfig {
    /// Version written into outgoing record headers.
    pub version: ProtocolVersion,
    /// Plaintext cap per record (1..=16384).
    pub max_fragment_length: usize,
    /// Size fragmented writes so each record fits one MTU-sized segment.
    pub small_records: bool,
    /// Use stitched CBC+HMAC ciphers where one exists.
    pub prefer_composite: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::TLS12,
            max_fragment_length: MAXIMUM_FRAGMENT_LENGTH,
            small_records: false,
            prefer_composite: false,
        }
    }
}

impl RecordConfig {
    pub fn builder() -> RecordConfigBuilder {
        RecordConfigBuilder {
            config: RecordConfig::default(),
        }
    }
}

/// Builder for [`RecordConfig`].
#[derive(Debug, Clone)]
pub struct RecordConfigBuilder {
    config: RecordConfig,
}

impl RecordConfigBuilder {
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.config.version = version;
        self
    }

    pub fn max_fragment_length(mut self, len: usize) -> Self {
        self.config.max_fragment_length = len;
        self
    }

    pub fn small_records(mut self, enabled: bool) -> Self {
        self.config.small_records = enabled;
        self
    }

    pub fn prefer_composite(mut self, enabled: bool) -> Self {
        self.config.prefer_composite = enabled;
        self
    }

    pub fn build(self) -> Result<RecordConfig, TlsError> {
        let len = self.config.max_fragment_length;
        if len == 0 || len > MAXIMUM_FRAGMENT_LENGTH {
            return Err(ConfigError::InvalidFragmentLength(len).into());
        }
        Ok(self.config)
    }
}
