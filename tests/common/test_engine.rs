use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use caapi::audit::{AuditTrail, MemoryAuditLogWriter};
use caapi::auth::identity::SettableIdentitySource;
use caapi::constants::BOOTSTRAP_ADMIN_USER_ID;
use caapi::data::enums::{AsymmetricKeyType, HashAlgorithm, Privilege};
use caapi::data::objects::{CreateCertificateAuthorityRequest, DistinguishedNameElements, Role, User};
use caapi::db::{CaApiDB, DataStore};
use caapi::settings::EngineSettings;
use caapi::sources::{FixedTimeSource, RandomSource};
use caapi::{ApiError, ApplicationEngine};
use crate::common::constants::*;

/// Hands out 1000, 1001, ... so serial numbers are predictable.
pub(crate) struct CountingRandomSource {
    next: AtomicI64,
}

impl CountingRandomSource {
    pub(crate) fn new(first: i64) -> Self {
        Self { next: AtomicI64::new(first) }
    }
}

impl RandomSource for CountingRandomSource {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, ApiError> {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        let mut bytes = vec![0u8; len.saturating_sub(8)];
        bytes.extend_from_slice(&value.to_be_bytes());
        bytes.truncate(len);
        Ok(bytes)
    }
}

pub(crate) fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
}

pub(crate) struct TestEngine {
    engine: ApplicationEngine,
    pub(crate) store: Arc<CaApiDB>,
    pub(crate) audit: Arc<MemoryAuditLogWriter>,
    pub(crate) identity: Arc<SettableIdentitySource>,
}

impl Deref for TestEngine {
    type Target = ApplicationEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl TestEngine {
    /// Engine over a fresh in-memory store, acting as the bootstrap admin.
    /// Nothing is initialized yet.
    pub(crate) fn new() -> Self {
        Self::with_store(Arc::new(CaApiDB::in_memory()))
    }

    pub(crate) fn with_store(store: Arc<CaApiDB>) -> Self {
        let audit = Arc::new(MemoryAuditLogWriter::new());
        let identity = Arc::new(SettableIdentitySource::new(Some(BOOTSTRAP_ADMIN_USER_ID)));
        let data_store: Arc<dyn DataStore> = store.clone();

        let engine = ApplicationEngine::new(
            EngineSettings::default(),
            data_store,
            identity.clone(),
            AuditTrail::new(audit.clone()),
            Arc::new(FixedTimeSource(test_instant())),
            Arc::new(CountingRandomSource::new(FIRST_SERIAL)),
        );

        TestEngine { engine, store, audit, identity }
    }

    pub(crate) fn new_initialized() -> Result<Self> {
        let engine = Self::new();
        engine.initialize()?;
        Ok(engine)
    }

    /// Initialized engine with four users and three roles:
    /// charlie is in the admin role (SystemAdmin), lucy in the issuer role
    /// (CertificateAdmin), linus in the reader role (CertificateReader) and
    /// schroeder in no role. The audit log is cleared afterwards.
    pub(crate) fn new_with_peanuts() -> Result<Self> {
        let engine = Self::new_initialized()?;

        for (user_id, name) in [
            (CHARLIE, "Charlie Brown"),
            (LUCY, "Lucy van Pelt"),
            (LINUS, "Linus van Pelt"),
            (SCHROEDER, "Schroeder"),
        ] {
            engine.create_user(&User::new(user_id, name, true))?;
        }

        for (role_id, name, privilege, member) in [
            (ADMIN_ROLE, "Peanuts Admins", Privilege::SystemAdmin, CHARLIE),
            (ISSUER_ROLE, "Peanuts Issuers", Privilege::CertificateAdmin, LUCY),
            (READER_ROLE, "Peanuts Readers", Privilege::CertificateReader, LINUS),
        ] {
            engine.create_role(&Role::new(role_id, name))?;
            engine.grant_role_privilege(role_id, privilege)?;
            engine.add_user_ids_to_role(role_id, &[member])?;
        }

        engine.audit.clear();
        Ok(engine)
    }

    pub(crate) fn switch_user(&self, user_id: Option<&str>) {
        self.identity.set(user_id);
    }
}

pub(crate) fn peanuts_subject() -> DistinguishedNameElements {
    DistinguishedNameElements {
        common_name: "Peanuts Root CA".to_string(),
        country_code: Some("US".to_string()),
        state_code: Some("MN".to_string()),
        locale: Some("Saint Paul".to_string()),
        organization: Some("Peanuts, Inc.".to_string()),
        organizational_unit: Some("Certificate Services".to_string()),
    }
}

pub(crate) fn root_request(certificate_id: &str) -> CreateCertificateAuthorityRequest {
    CreateCertificateAuthorityRequest {
        certificate_id: certificate_id.to_string(),
        description: "Peanuts test root".to_string(),
        subject_name_elements: peanuts_subject(),
        asymmetric_key_type: AsymmetricKeyType::NistP256,
        hash_algorithm: HashAlgorithm::Sha256,
        asymmetric_private_key_passphrase: TEST_PASSPHRASE.to_string(),
        create_intermediate: false,
        years_until_expire: 10,
        path_length: 2,
    }
}
