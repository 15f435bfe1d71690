//! TLS wire constants and IANA registry codes.
//!
//! Cipher suite codes come from the IANA "TLS Cipher Suites" registry and must
//! stay bit-exact for interoperability.

/// Record header: content_type(1) + version(2) + length(2).
pub const RECORD_HEADER_LENGTH: usize = 5;

/// Maximum plaintext fragment (2^14).
pub const MAXIMUM_FRAGMENT_LENGTH: usize = 16384;

/// Maximum plaintext record including the header.
pub const MAXIMUM_RECORD_LENGTH: usize = MAXIMUM_FRAGMENT_LENGTH + RECORD_HEADER_LENGTH;

/// Expansion a protected fragment may carry over its plaintext (RFC 5246 §6.2.3).
pub const MAXIMUM_CIPHERTEXT_EXPANSION: usize = 2048;

/// Maximum protected record including the header.
pub const MAXIMUM_CIPHERTEXT_RECORD_LENGTH: usize =
    MAXIMUM_RECORD_LENGTH + MAXIMUM_CIPHERTEXT_EXPANSION;

/// Record sized to the dominant internet MTU: 1500 minus IP, TCP and TCP options.
pub const SMALL_RECORD_LENGTH: usize = 1500 - 20 - 20 - 20;
pub const SMALL_FRAGMENT_LENGTH: usize = SMALL_RECORD_LENGTH - RECORD_HEADER_LENGTH;
pub const LARGE_RECORD_LENGTH: usize = MAXIMUM_RECORD_LENGTH;
pub const LARGE_FRAGMENT_LENGTH: usize = MAXIMUM_FRAGMENT_LENGTH;

/// SSLv2 records: neither of the top two length bits is usable.
pub const SSL2_RECORD_HEADER_LENGTH: usize = 2;
pub const SSL2_MAXIMUM_MESSAGE_LENGTH: usize = 16383;
pub const SSL2_MAXIMUM_RECORD_LENGTH: usize =
    SSL2_MAXIMUM_MESSAGE_LENGTH + SSL2_RECORD_HEADER_LENGTH;

/// Cap on any single handshake message.
pub const MAXIMUM_HANDSHAKE_MESSAGE_LENGTH: usize = 64 * 1024;

/// Handshake header: msg_type(1) + length(3).
pub const HANDSHAKE_HEADER_LENGTH: usize = 4;

/// Alert body: level(1) + description(1).
pub const ALERT_LENGTH: usize = 2;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    /// Convert from the wire tag. Unknown tags are returned as the error.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            _ => Err(v),
        }
    }
}

/// Record-layer protocol version as carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const SSL3: Self = Self(0x0300);
    pub const TLS10: Self = Self(0x0301);
    pub const TLS11: Self = Self(0x0302);
    pub const TLS12: Self = Self(0x0303);

    pub fn major(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(self) -> u8 {
        self.0 as u8
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

/// TLS cipher suite identifier (IANA 2-byte code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const TLS_NULL_WITH_NULL_NULL: Self = Self(0x0000);

    // RSA key exchange
    pub const TLS_RSA_WITH_RC4_128_MD5: Self = Self(0x0004);
    pub const TLS_RSA_WITH_RC4_128_SHA: Self = Self(0x0005);
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x000A);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x003C);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA256: Self = Self(0x003D);
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009C);
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009D);

    // DHE_RSA key exchange
    pub const TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x0016);
    pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x0033);
    pub const TLS_DHE_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0039);
    pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x0067);
    pub const TLS_DHE_RSA_WITH_AES_256_CBC_SHA256: Self = Self(0x006B);
    pub const TLS_DHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009E);
    pub const TLS_DHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009F);

    // ECDHE_RSA key exchange
    pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0xC012);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0xC013);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: Self = Self(0xC014);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0xC027);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: Self = Self(0xC028);
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256: Self = Self(0xCCA8);

    // Signalling suites (RFC 7507, RFC 5746)
    pub const TLS_FALLBACK_SCSV: Self = Self(0x5600);
    pub const TLS_EMPTY_RENEGOTIATION_INFO_SCSV: Self = Self(0x00FF);

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Returns true for signalling values that never select a cipher.
    pub fn is_scsv(self) -> bool {
        self == Self::TLS_FALLBACK_SCSV || self == Self::TLS_EMPTY_RENEGOTIATION_INFO_SCSV
    }
}

/// Hello extension codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const STATUS_REQUEST: Self = Self(5);
    pub const ELLIPTIC_CURVES: Self = Self(10);
    pub const EC_POINT_FORMATS: Self = Self(11);
    pub const SIGNATURE_ALGORITHMS: Self = Self(13);
    pub const ALPN: Self = Self(16);
    pub const RENEGOTIATION_INFO: Self = Self(65281);
}

/// TLS 1.2 `HashAlgorithm` registry values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashAlgorithm(pub u8);

impl HashAlgorithm {
    pub const MD5: Self = Self(1);
    pub const SHA1: Self = Self(2);
    pub const SHA224: Self = Self(3);
    pub const SHA256: Self = Self(4);
    pub const SHA384: Self = Self(5);
    pub const SHA512: Self = Self(6);
}

/// TLS 1.2 `SignatureAlgorithm` registry values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureAlgorithm(pub u8);

impl SignatureAlgorithm {
    pub const RSA: Self = Self(1);
}

/// Elliptic curve identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedCurve(pub u16);

impl NamedCurve {
    pub const SECP256R1: Self = Self(23);
    pub const SECP384R1: Self = Self(24);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lengths() {
        assert_eq!(RECORD_HEADER_LENGTH, 5);
        assert_eq!(MAXIMUM_FRAGMENT_LENGTH, 16384);
        assert_eq!(MAXIMUM_RECORD_LENGTH, 16389);
        assert_eq!(MAXIMUM_CIPHERTEXT_RECORD_LENGTH, 16389 + 2048);
        assert_eq!(HANDSHAKE_HEADER_LENGTH, 4);
        assert_eq!(ALERT_LENGTH, 2);
    }

    #[test]
    fn test_small_and_large_records() {
        assert_eq!(SMALL_RECORD_LENGTH, 1440);
        assert_eq!(SMALL_FRAGMENT_LENGTH, 1435);
        assert_eq!(LARGE_FRAGMENT_LENGTH, MAXIMUM_FRAGMENT_LENGTH);
        assert_eq!(SSL2_MAXIMUM_RECORD_LENGTH, 16385);
    }

    #[test]
    fn test_content_type_from_u8() {
        for code in 20u8..=23 {
            assert_eq!(ContentType::from_u8(code).unwrap() as u8, code);
        }
        assert_eq!(ContentType::from_u8(19).unwrap_err(), 19);
        assert_eq!(ContentType::from_u8(24).unwrap_err(), 24);
    }

    #[test]
    fn test_cipher_suite_wire_bytes() {
        assert_eq!(
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA.to_bytes(),
            [0x00, 0x2F]
        );
        assert_eq!(
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384.to_bytes(),
            [0xC0, 0x28]
        );
        assert_eq!(
            CipherSuite::from_bytes([0xC0, 0x2F]),
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        );
        assert!(CipherSuite::TLS_FALLBACK_SCSV.is_scsv());
        assert!(!CipherSuite::TLS_RSA_WITH_RC4_128_SHA.is_scsv());
    }

    #[test]
    fn test_protocol_version_parts() {
        assert_eq!(ProtocolVersion::TLS12.major(), 3);
        assert_eq!(ProtocolVersion::TLS12.minor(), 3);
        assert_eq!(ProtocolVersion::TLS10.to_bytes(), [0x03, 0x01]);
    }

    #[test]
    fn test_registry_codes() {
        assert_eq!(ExtensionType::RENEGOTIATION_INFO.0, 0xFF01);
        assert_eq!(HashAlgorithm::SHA256.0, 4);
        assert_eq!(NamedCurve::SECP384R1.0, 24);
    }
}
