use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::data::enums::{AsymmetricKeyType, HashAlgorithm, Privilege};
use crate::helper::{self, assert_condition, assert_not_blank};
use crate::ApiError;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub friendly_name: String,
    pub is_active: bool,
}

impl User {
    pub fn new(user_id: &str, friendly_name: &str, is_active: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            friendly_name: friendly_name.to_string(),
            is_active,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.user_id, "UserId")?;
        assert_not_blank(&self.friendly_name, "FriendlyName")
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub role_id: String,
    pub friendly_name: String,
}

impl Role {
    pub fn new(role_id: &str, friendly_name: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            friendly_name: friendly_name.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.role_id, "RoleId")?;
        assert_not_blank(&self.friendly_name, "FriendlyName")
    }
}

/// Membership of a user in a role.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserRole {
    pub user_id: String,
    pub role_id: String,
}

impl UserRole {
    pub fn new(user_id: &str, role_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.user_id, "UserId")?;
        assert_not_blank(&self.role_id, "RoleId")
    }
}

/// Grant of a privilege to a role.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RolePrivilege {
    pub role_id: String,
    pub privilege: Privilege,
}

impl RolePrivilege {
    pub fn new(role_id: &str, privilege: Privilege) -> Self {
        Self {
            role_id: role_id.to_string(),
            privilege,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.role_id, "RoleId")
    }
}

/// Subject name parts of a certificate. Only the common name is mandatory.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedNameElements {
    pub common_name: String,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub locale: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
}

impl DistinguishedNameElements {
    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.common_name, "CommonName")?;
        if let Some(country) = helper::non_blank(&self.country_code) {
            assert_condition(
                country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic()),
                "must be a two letter country code",
                "CountryCode",
            )?;
        }
        Ok(())
    }

    /// Short attribute names paired with their values, in DN order, blanks skipped.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let mut entries = vec![("CN", self.common_name.trim())];
        let optional = [
            ("C", &self.country_code),
            ("ST", &self.state_code),
            ("L", &self.locale),
            ("O", &self.organization),
            ("OU", &self.organizational_unit),
        ];
        for (name, value) in optional {
            if let Some(value) = helper::non_blank(value) {
                entries.push((name, value));
            }
        }
        entries
    }

    /// Render as an escaped DN string, e.g. `CN=Root CA,C=US,O=Peanuts\, Inc.`
    pub fn to_dn_string(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(name, value)| format!("{name}={}", helper::escape_dn_value(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct CreateCertificateAuthorityRequest {
    pub certificate_id: String,
    pub description: String,
    pub subject_name_elements: DistinguishedNameElements,
    pub asymmetric_key_type: AsymmetricKeyType,
    pub hash_algorithm: HashAlgorithm,
    #[serde(skip_serializing)]
    pub asymmetric_private_key_passphrase: String,
    /// Accepted for compatibility; root and intermediate requests are built the same way.
    #[serde(default)]
    pub create_intermediate: bool,
    pub years_until_expire: u32,
    pub path_length: u32,
}

impl std::fmt::Debug for CreateCertificateAuthorityRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCertificateAuthorityRequest")
            .field("certificate_id", &self.certificate_id)
            .field("description", &self.description)
            .field("subject_name_elements", &self.subject_name_elements)
            .field("asymmetric_key_type", &self.asymmetric_key_type)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("asymmetric_private_key_passphrase", &"<redacted>")
            .field("create_intermediate", &self.create_intermediate)
            .field("years_until_expire", &self.years_until_expire)
            .field("path_length", &self.path_length)
            .finish()
    }
}

impl CreateCertificateAuthorityRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.certificate_id, "CertificateId")?;
        assert_not_blank(&self.description, "Description")?;
        assert_not_blank(&self.asymmetric_private_key_passphrase, "AsymmetricPrivateKeyPassphrase")?;
        assert_condition(self.years_until_expire > 0, "must be greater than 0", "YearsUntilExpire")?;
        assert_condition(self.path_length > 0, "must be greater than 0", "PathLength")?;
        self.subject_name_elements.validate()
    }
}

/// Stored certificate authority, including its passphrase protected PKCS#12 bundle.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub certificate_id: String,
    pub issuer_certificate_id: Option<String>,
    pub is_active: bool,
    pub serial_number: i64,
    pub thumbprint: String,
    pub subject: String,
    pub issuer: String,
    pub description: String,
    pub common_name: String,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub locale: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    #[serde(serialize_with = "helper::serialize_blob_len", skip_deserializing)]
    pub pkcs12: Vec<u8>,
}

impl Certificate {
    pub fn validate(&self) -> Result<(), ApiError> {
        assert_not_blank(&self.certificate_id, "CertificateId")?;
        assert_condition(self.serial_number > 0, "must be greater than zero", "SerialNumber")?;
        assert_not_blank(&self.description, "Description")?;
        assert_not_blank(&self.common_name, "CommonName")?;
        assert_condition(!self.pkcs12.is_empty(), "must not be empty", "Pkcs12BinaryWithPrivateKey")
    }
}
