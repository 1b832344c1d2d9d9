use tracing::{debug, info};
use crate::auth::passphrase::assert_passphrase_complexity;
use crate::cert::{signature_digest, CaCertificateBuilder, KeySpec};
use crate::data::audit::Locus;
use crate::data::enums::Privilege;
use crate::data::objects::{Certificate, CreateCertificateAuthorityRequest};
use crate::db::in_transaction;
use crate::helper::{assert_not_blank, non_blank};
use crate::ApiError;
use super::ApplicationEngine;

impl ApplicationEngine {
    /// Generate a key pair, self-sign a CA certificate for it and store the
    /// passphrase protected PKCS#12 bundle under `certificate_id`.
    pub fn create_root_certificate(&self, request: &CreateCertificateAuthorityRequest) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        request.validate()?;
        assert_passphrase_complexity(&request.asymmetric_private_key_passphrase, &self.settings.passphrase_mandates)?;

        let certificate_id = request.certificate_id.as_str();
        self.audited(
            &actor,
            Locus::CERTIFICATE_CREATE,
            "CreateRootCertificate",
            Privilege::CertificateAdmin,
            format!("{actor} is creating root certificate:[{certificate_id}]"),
            |details| {
                let key_spec = KeySpec::try_from(request.asymmetric_key_type)?;
                let digest = signature_digest(key_spec, request.hash_algorithm)?;
                if request.create_intermediate {
                    debug!(certificate_id, "intermediate flag ignored, issuing a self-signed authority");
                }

                let serial_number = self.random.positive_i64()?;
                let issued = CaCertificateBuilder::new(key_spec, digest)?
                    .set_serial_number(serial_number)?
                    .set_subject(&request.subject_name_elements)?
                    .set_validity(self.clock.utc_now(), request.years_until_expire)?
                    .set_path_length(request.path_length)?
                    .set_friendly_name(certificate_id)?
                    .build_ca(&request.asymmetric_private_key_passphrase)?;

                let names = &request.subject_name_elements;
                let certificate = Certificate {
                    certificate_id: certificate_id.to_string(),
                    issuer_certificate_id: None,
                    is_active: true,
                    serial_number,
                    thumbprint: issued.thumbprint,
                    issuer: issued.subject.clone(),
                    subject: issued.subject,
                    description: request.description.clone(),
                    common_name: names.common_name.trim().to_string(),
                    country_code: non_blank(&names.country_code).map(str::to_string),
                    state_code: non_blank(&names.state_code).map(str::to_string),
                    locale: non_blank(&names.locale).map(str::to_string),
                    organization: non_blank(&names.organization).map(str::to_string),
                    organizational_unit: non_blank(&names.organizational_unit).map(str::to_string),
                    not_before: issued.not_before,
                    not_after: issued.not_after,
                    pkcs12: issued.pkcs12,
                };
                certificate.validate()?;

                let store = self.store.as_ref();
                in_transaction(store, || {
                    if store.exists_certificate(certificate_id)? {
                        return Err(ApiError::DomainConflict(format!("Certificate {certificate_id} already exists")));
                    }
                    store.insert_certificate(&certificate)
                })?;

                details.report(format!(
                    "certificate {certificate_id} issued with serial number {serial_number} and thumbprint {}",
                    certificate.thumbprint
                ))?;
                info!(certificate_id, serial_number, "root certificate created");
                Ok(())
            },
        )
    }

    pub fn certificate_exists(&self, certificate_id: &str) -> Result<bool, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(certificate_id, "CertificateId")?;

        self.audited(
            &actor,
            Locus::CERTIFICATE_FETCH,
            "CertificateExists",
            Privilege::CertificateReader,
            format!("{actor} is checking existence of certificate:[{certificate_id}]"),
            |_| self.store.exists_certificate(certificate_id),
        )
    }

    pub fn fetch_certificate(&self, certificate_id: &str) -> Result<Option<Certificate>, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(certificate_id, "CertificateId")?;

        self.audited(
            &actor,
            Locus::CERTIFICATE_FETCH,
            "FetchCertificate",
            Privilege::CertificateReader,
            format!("{actor} is fetching certificate:[{certificate_id}]"),
            |_| self.store.fetch_certificate(certificate_id),
        )
    }
}
