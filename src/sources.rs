use chrono::{DateTime, Utc};
use openssl::rand::rand_bytes;
use crate::ApiError;

/// Supplies the current instant. Certificate validity windows start here.
pub trait TimeSource: Send + Sync {
    fn utc_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn utc_now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Cryptographically secure randomness.
pub trait RandomSource: Send + Sync {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, ApiError>;

    /// A random integer in `1..=i64::MAX`.
    fn positive_i64(&self) -> Result<i64, ApiError> {
        loop {
            let bytes = self.random_bytes(8)?;
            let buf: [u8; 8] = bytes.get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| ApiError::Precondition("random source returned too few bytes".to_string()))?;
            let value = i64::from_be_bytes(buf) & i64::MAX;
            if value > 0 {
                return Ok(value);
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSslRandomSource;

impl RandomSource for OpenSslRandomSource {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, ApiError> {
        let mut buf = vec![0u8; len];
        rand_bytes(&mut buf)?;
        Ok(buf)
    }
}
