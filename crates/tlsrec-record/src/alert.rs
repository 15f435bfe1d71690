//! TLS alert protocol, limited to what the record layer raises or relays.

use tlsrec_types::{TlsError, ALERT_LENGTH};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes (RFC 5246 §7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    /// Must not be sent (RFC 5246); replaced by BadRecordMac.
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    IllegalParameter = 47,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    InappropriateFallback = 86,
    UserCanceled = 90,
    NoRenegotiation = 100,
}

/// A TLS alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl AlertLevel {
    /// Convert from u8 to AlertLevel.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl AlertDescription {
    /// Convert from u8 to AlertDescription.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            21 => Ok(AlertDescription::DecryptionFailed),
            22 => Ok(AlertDescription::RecordOverflow),
            30 => Ok(AlertDescription::DecompressionFailure),
            40 => Ok(AlertDescription::HandshakeFailure),
            47 => Ok(AlertDescription::IllegalParameter),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            70 => Ok(AlertDescription::ProtocolVersion),
            71 => Ok(AlertDescription::InsufficientSecurity),
            80 => Ok(AlertDescription::InternalError),
            86 => Ok(AlertDescription::InappropriateFallback),
            90 => Ok(AlertDescription::UserCanceled),
            100 => Ok(AlertDescription::NoRenegotiation),
            _ => Err(v),
        }
    }
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Self {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
    }

    /// Wire form: level(1) || description(1).
    pub fn encode(&self) -> [u8; ALERT_LENGTH] {
        [self.level as u8, self.description as u8]
    }

    /// Parse an alert record body. It must be exactly two bytes.
    pub fn decode(data: &[u8]) -> Result<Self, TlsError> {
        if data.len() != ALERT_LENGTH {
            return Err(TlsError::RecordDecodeError(format!(
                "alert length {} != {ALERT_LENGTH}",
                data.len()
            )));
        }
        let level = AlertLevel::from_u8(data[0])
            .map_err(|v| TlsError::RecordDecodeError(format!("unknown alert level {v}")))?;
        let description = AlertDescription::from_u8(data[1]).map_err(|v| {
            TlsError::RecordDecodeError(format!("unknown alert description {v}"))
        })?;
        Ok(Self { level, description })
    }
}

/// The fatal alert to send before closing after `err`.
///
/// Padding and MAC failures share one alert so the peer cannot tell
/// them apart.
pub fn alert_for(err: &TlsError) -> Alert {
    let description = match err {
        TlsError::CryptographicFailure => AlertDescription::BadRecordMac,
        TlsError::RecordTooLarge { .. } => AlertDescription::RecordOverflow,
        TlsError::RecordDecodeError(_) => AlertDescription::DecodeError,
        TlsError::ConfigurationError(_)
        | TlsError::BufferTooSmall { .. }
        | TlsError::SequenceOverflow
        | TlsError::CryptoError(_) => AlertDescription::InternalError,
    };
    Alert::fatal(description)
}
