use std::fmt::Display;
use std::str::FromStr;
use num_enum::{FromPrimitive, TryFromPrimitive};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Capabilities a role can be granted. Stored by name.
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    SystemAdmin,
    CertificateAdmin,
    CertificateReader,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::SystemAdmin => "SystemAdmin",
            Privilege::CertificateAdmin => "CertificateAdmin",
            Privilege::CertificateReader => "CertificateReader",
        }
    }
}

impl Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SystemAdmin" => Ok(Privilege::SystemAdmin),
            "CertificateAdmin" => Ok(Privilege::CertificateAdmin),
            "CertificateReader" => Ok(Privilege::CertificateReader),
            _ => Err(format!("unknown privilege: {s}")),
        }
    }
}

impl FromSql for Privilege {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(s) => {
                let s = String::from_utf8_lossy(s);
                Privilege::from_str(&s).map_err(|_| FromSqlError::InvalidType)
            },
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for Privilege {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Key pair flavours a certificate authority can be issued with.
/// Codes outside the known set are kept so they can be rejected explicitly.
#[derive(Serialize, Deserialize, FromPrimitive, Clone, Debug, Copy, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
#[repr(u8)]
pub enum AsymmetricKeyType {
    Rsa2048 = 0,
    Rsa4096 = 1,
    NistP256 = 2,
    NistP384 = 3,
    NistP521 = 4,
    #[num_enum(catch_all)]
    Unrecognized(u8),
}

impl From<AsymmetricKeyType> for u8 {
    fn from(value: AsymmetricKeyType) -> Self {
        match value {
            AsymmetricKeyType::Rsa2048 => 0,
            AsymmetricKeyType::Rsa4096 => 1,
            AsymmetricKeyType::NistP256 => 2,
            AsymmetricKeyType::NistP384 => 3,
            AsymmetricKeyType::NistP521 => 4,
            AsymmetricKeyType::Unrecognized(code) => code,
        }
    }
}

/// Signature digests. `Md5` and `Sha1` exist only so that legacy requests
/// can be recognised and refused.
#[derive(Serialize, Deserialize, FromPrimitive, Clone, Debug, Copy, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
#[repr(u8)]
pub enum HashAlgorithm {
    Md5 = 0,
    Sha1 = 1,
    Sha256 = 2,
    Sha384 = 3,
    Sha512 = 4,
    Sha3_256 = 5,
    Sha3_384 = 6,
    Sha3_512 = 7,
    #[num_enum(catch_all)]
    Unrecognized(u8),
}

impl From<HashAlgorithm> for u8 {
    fn from(value: HashAlgorithm) -> Self {
        match value {
            HashAlgorithm::Md5 => 0,
            HashAlgorithm::Sha1 => 1,
            HashAlgorithm::Sha256 => 2,
            HashAlgorithm::Sha384 => 3,
            HashAlgorithm::Sha512 => 4,
            HashAlgorithm::Sha3_256 => 5,
            HashAlgorithm::Sha3_384 => 6,
            HashAlgorithm::Sha3_512 => 7,
            HashAlgorithm::Unrecognized(code) => code,
        }
    }
}

#[derive(Serialize_repr, Deserialize_repr, TryFromPrimitive, Clone, Debug, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuditEntryType {
    Begin = 0,
    Processing = 1,
    Success = 2,
    Failure = 3,
}

impl Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditEntryType::Begin => "Begin",
            AuditEntryType::Processing => "Processing",
            AuditEntryType::Success => "Success",
            AuditEntryType::Failure => "Failure",
        };
        f.write_str(name)
    }
}

impl FromSql for AuditEntryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => {
                let value = u8::try_from(i).map_err(|_| FromSqlError::OutOfRange(i))?;
                AuditEntryType::try_from(value)
                    .map_err(|_| FromSqlError::InvalidType)
            },
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for AuditEntryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as u8))
    }
}
