use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::data::enums::AuditEntryType;

/// One line of the audit trail. Every entry emitted for a single engine call
/// shares the same correlation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub correlation_id: String,
    pub entry_type: AuditEntryType,
    pub occurrence_utc: DateTime<Utc>,
    pub acting_user_id: String,
    pub locus: String,
    pub summary: String,
    pub detail: String,
}

impl AuditLogEntry {
    pub fn new(
        correlation_id: &str,
        entry_type: AuditEntryType,
        acting_user_id: &str,
        locus: &str,
        summary: &str,
        detail: String,
    ) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            entry_type,
            occurrence_utc: Utc::now(),
            acting_user_id: acting_user_id.to_string(),
            locus: locus.to_string(),
            summary: summary.to_string(),
            detail,
        }
    }
}

/// Dotted operation paths recorded on audit entries. These strings are read
/// by external audit consumers and must not change.
pub struct Locus;

impl Locus {
    pub const USER_CREATE: &'static str = "Administration.User.Create";
    pub const USER_UPDATE: &'static str = "Administration.User.Update";
    pub const USER_DELETE: &'static str = "Administration.User.Delete";
    pub const USER_FETCH: &'static str = "Administration.User.Fetch";
    pub const USER_CHECK_PRIVILEGE: &'static str = "Administration.User.CheckPrivilege";
    pub const ROLE_CREATE: &'static str = "Administration.Role.Create";
    pub const ROLE_UPDATE: &'static str = "Administration.Role.Update";
    pub const ROLE_DELETE: &'static str = "Administration.Role.Delete";
    pub const ROLE_FETCH: &'static str = "Administration.Role.Fetch";
    pub const ROLE_GRANT: &'static str = "Administration.Role.Grant";
    pub const ROLE_REVOKE: &'static str = "Administration.Role.Revoke";
    pub const USER_ROLE_FETCH: &'static str = "Administration.UserRole.Fetch";
    pub const CERTIFICATE_CREATE: &'static str = "Certificates.Certificate.Create";
    pub const CERTIFICATE_FETCH: &'static str = "Certificates.Certificate.Fetch";
}

/// Filter for reading persisted audit entries back.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditLogQuery {
    pub locus: Option<String>,
    pub correlation_id: Option<String>,
    pub acting_user_id: Option<String>,
    pub entry_type: Option<AuditEntryType>,
    pub limit: Option<u32>,
}
