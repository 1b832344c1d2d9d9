use chrono::{DateTime, Months, Utc};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};
use tracing::debug;
use crate::data::enums::{AsymmetricKeyType, HashAlgorithm};
use crate::data::objects::DistinguishedNameElements;
use crate::ApiError;

/// Key pair parameters, resolved before any key material is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Rsa(u32),
    Ec(Nid),
}

impl TryFrom<AsymmetricKeyType> for KeySpec {
    type Error = ApiError;

    fn try_from(key_type: AsymmetricKeyType) -> Result<Self, Self::Error> {
        match key_type {
            AsymmetricKeyType::Rsa2048 => Ok(KeySpec::Rsa(2048)),
            AsymmetricKeyType::Rsa4096 => Ok(KeySpec::Rsa(4096)),
            AsymmetricKeyType::NistP256 => Ok(KeySpec::Ec(Nid::X9_62_PRIME256V1)),
            AsymmetricKeyType::NistP384 => Ok(KeySpec::Ec(Nid::SECP384R1)),
            AsymmetricKeyType::NistP521 => Ok(KeySpec::Ec(Nid::SECP521R1)),
            AsymmetricKeyType::Unrecognized(code) => {
                Err(ApiError::Unsupported(format!("unaccounted asymmetric key type: {code}")))
            }
        }
    }
}

/// Signature digest for a hash algorithm. Legacy MD5 and SHA-1 are refused.
pub fn message_digest(hash: HashAlgorithm) -> Result<MessageDigest, ApiError> {
    match hash {
        HashAlgorithm::Sha256 => Ok(MessageDigest::sha256()),
        HashAlgorithm::Sha384 => Ok(MessageDigest::sha384()),
        HashAlgorithm::Sha512 => Ok(MessageDigest::sha512()),
        HashAlgorithm::Sha3_256 => Ok(MessageDigest::sha3_256()),
        HashAlgorithm::Sha3_384 => Ok(MessageDigest::sha3_384()),
        HashAlgorithm::Sha3_512 => Ok(MessageDigest::sha3_512()),
        HashAlgorithm::Md5 | HashAlgorithm::Sha1 => {
            Err(ApiError::Unsupported(format!("hash algorithm {hash:?} is not permitted")))
        }
        HashAlgorithm::Unrecognized(code) => {
            Err(ApiError::Unsupported(format!("unaccounted hash algorithm: {code}")))
        }
    }
}

/// Signature digest for a key pair. ECDSA with SHA3 is refused, OpenSSL
/// cannot sign X.509 structures with that pairing.
pub fn signature_digest(key_spec: KeySpec, hash: HashAlgorithm) -> Result<MessageDigest, ApiError> {
    let digest = message_digest(hash)?;
    let sha3 = matches!(hash, HashAlgorithm::Sha3_256 | HashAlgorithm::Sha3_384 | HashAlgorithm::Sha3_512);
    if let (KeySpec::Ec(curve), true) = (key_spec, sha3) {
        return Err(ApiError::Unsupported(format!(
            "hash algorithm {hash:?} cannot sign with elliptic curve {}",
            curve.short_name().unwrap_or("unknown")
        )));
    }
    Ok(digest)
}

/// A freshly minted, self-signed certificate authority.
pub struct IssuedAuthority {
    pub certificate: X509,
    pub pkcs12: Vec<u8>,
    pub subject: String,
    pub thumbprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

pub struct CaCertificateBuilder {
    x509: X509Builder,
    private_key: PKey<Private>,
    digest: MessageDigest,
    subject: Option<DistinguishedNameElements>,
    validity: Option<(DateTime<Utc>, DateTime<Utc>)>,
    path_length: Option<u32>,
    friendly_name: Option<String>,
}

impl CaCertificateBuilder {
    pub fn new(key_spec: KeySpec, digest: MessageDigest) -> Result<Self, ApiError> {
        let private_key = generate_private_key(key_spec)?;

        let mut x509 = X509Builder::new()?;
        x509.set_version(2)?;
        x509.set_pubkey(&private_key)?;

        Ok(Self {
            x509,
            private_key,
            digest,
            subject: None,
            validity: None,
            path_length: None,
            friendly_name: None,
        })
    }

    pub fn set_serial_number(mut self, serial: i64) -> Result<Self, ApiError> {
        let serial = serial_number(serial)?;
        self.x509.set_serial_number(&serial)?;
        Ok(self)
    }

    pub fn set_subject(mut self, elements: &DistinguishedNameElements) -> Result<Self, ApiError> {
        let name = create_name(elements)?;
        self.x509.set_subject_name(&name)?;
        self.subject = Some(elements.clone());
        Ok(self)
    }

    /// Valid from `not_before` for `years` calendar years.
    pub fn set_validity(mut self, not_before: DateTime<Utc>, years: u32) -> Result<Self, ApiError> {
        let not_after = years
            .checked_mul(12)
            .and_then(|months| not_before.checked_add_months(Months::new(months)))
            .ok_or_else(|| ApiError::Validation(format!("YearsUntilExpire {years} is out of range")))?;
        let nb = asn1_time(not_before)?;
        let na = asn1_time(not_after)?;
        self.x509.set_not_before(&nb)?;
        self.x509.set_not_after(&na)?;
        self.validity = Some((not_before, not_after));
        Ok(self)
    }

    pub fn set_path_length(mut self, path_length: u32) -> Result<Self, ApiError> {
        self.path_length = Some(path_length);
        Ok(self)
    }

    /// Friendly name of the PKCS#12 bag.
    pub fn set_friendly_name(mut self, name: &str) -> Result<Self, ApiError> {
        self.friendly_name = Some(name.to_string());
        Ok(self)
    }

    /// Self-sign and export the key with its certificate as a PKCS#12 bundle.
    pub fn build_ca(mut self, passphrase: &str) -> Result<IssuedAuthority, ApiError> {
        let subject = self.subject.ok_or_else(|| missing("subject"))?;
        let (not_before, not_after) = self.validity.ok_or_else(|| missing("validity"))?;
        let path_length = self.path_length.ok_or_else(|| missing("path length"))?;
        let friendly_name = self.friendly_name.ok_or_else(|| missing("friendly name"))?;

        let issuer = create_name(&subject)?;
        self.x509.set_issuer_name(&issuer)?;

        let basic_constraints = BasicConstraints::new()
            .critical()
            .ca()
            .pathlen(path_length)
            .build()?;
        self.x509.append_extension(basic_constraints)?;

        let subject_key_identifier = SubjectKeyIdentifier::new().build(&self.x509.x509v3_context(None, None))?;
        self.x509.append_extension(subject_key_identifier)?;

        let key_usage = KeyUsage::new()
            .key_cert_sign()
            .crl_sign()
            .build()?;
        self.x509.append_extension(key_usage)?;

        self.x509.sign(&self.private_key, self.digest)?;
        let certificate = self.x509.build();

        let pkcs12 = Pkcs12::builder()
            .name(&friendly_name)
            .pkey(&self.private_key)
            .cert(&certificate)
            .build2(passphrase)?;

        let thumbprint = hex::encode_upper(&*certificate.digest(MessageDigest::sha1())?);
        debug!(thumbprint = %thumbprint, "self-signed certificate authority built");

        Ok(IssuedAuthority {
            pkcs12: pkcs12.to_der()?,
            certificate,
            subject: subject.to_dn_string(),
            thumbprint,
            not_before,
            not_after,
        })
    }
}

fn missing(field: &str) -> ApiError {
    ApiError::Validation(format!("certificate {field} not set"))
}

fn generate_private_key(key_spec: KeySpec) -> Result<PKey<Private>, ErrorStack> {
    match key_spec {
        KeySpec::Rsa(bits) => PKey::from_rsa(Rsa::generate(bits)?),
        KeySpec::Ec(curve) => {
            let group = EcGroup::from_curve_name(curve)?;
            PKey::from_ec_key(EcKey::generate(&group)?)
        }
    }
}

fn create_name(elements: &DistinguishedNameElements) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (field, value) in elements.entries() {
        name_builder.append_entry_by_text(field, value)?;
    }
    Ok(name_builder.build())
}

fn serial_number(serial: i64) -> Result<Asn1Integer, ApiError> {
    if serial <= 0 {
        return Err(ApiError::Validation("SerialNumber must be greater than zero".to_string()));
    }
    Ok(BigNum::from_dec_str(&serial.to_string())?.to_asn1_integer()?)
}

fn asn1_time(instant: DateTime<Utc>) -> Result<Asn1Time, ApiError> {
    let seconds = instant
        .timestamp()
        .try_into()
        .map_err(|_| ApiError::Validation(format!("{instant} cannot be represented as a certificate time")))?;
    Ok(Asn1Time::from_unix(seconds)?)
}
