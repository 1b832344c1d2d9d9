use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use crate::audit::{AuditDetails, AuditTrail};
use crate::auth::identity::IdentitySource;
use crate::auth::permissions::PrivilegeGuard;
use crate::constants::{
    BOOTSTRAP_ADMIN_ROLE_ID, BOOTSTRAP_ADMIN_ROLE_NAME, BOOTSTRAP_ADMIN_USER_ID, BOOTSTRAP_ADMIN_USER_NAME,
};
use crate::data::enums::Privilege;
use crate::data::objects::{Role, User, UserRole};
use crate::db::{in_transaction, DataStore};
use crate::settings::EngineSettings;
use crate::sources::{RandomSource, TimeSource};
use crate::ApiError;

mod administration;
mod certificates;

/// Entry point for every administrative and certificate operation.
///
/// Each public operation resolves the acting user, validates its input,
/// and then runs inside an audit wrap that checks the required privilege
/// before touching the store.
pub struct ApplicationEngine {
    settings: EngineSettings,
    store: Arc<dyn DataStore>,
    identity: Arc<dyn IdentitySource>,
    audit: AuditTrail,
    clock: Arc<dyn TimeSource>,
    random: Arc<dyn RandomSource>,
}

impl ApplicationEngine {
    pub fn new(
        settings: EngineSettings,
        store: Arc<dyn DataStore>,
        identity: Arc<dyn IdentitySource>,
        audit: AuditTrail,
        clock: Arc<dyn TimeSource>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self { settings, store, identity, audit, clock, random }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Prepare the schema and make sure the bootstrap administrator exists.
    /// Running it again changes nothing.
    pub fn initialize(&self) -> Result<(), ApiError> {
        let store = self.store.as_ref();
        store.initialize()?;

        in_transaction(store, || {
            if !store.exists_user(BOOTSTRAP_ADMIN_USER_ID)? {
                store.insert_user(&User::new(BOOTSTRAP_ADMIN_USER_ID, BOOTSTRAP_ADMIN_USER_NAME, true))?;
            }
            if !store.exists_role(BOOTSTRAP_ADMIN_ROLE_ID)? {
                store.insert_role(&Role::new(BOOTSTRAP_ADMIN_ROLE_ID, BOOTSTRAP_ADMIN_ROLE_NAME))?;
            }
            if !store.exists_role_privilege(BOOTSTRAP_ADMIN_ROLE_ID, Privilege::SystemAdmin)? {
                store.insert_role_privilege(BOOTSTRAP_ADMIN_ROLE_ID, Privilege::SystemAdmin)?;
            }
            store.persist_user_role(&UserRole::new(BOOTSTRAP_ADMIN_USER_ID, BOOTSTRAP_ADMIN_ROLE_ID))?;
            Ok(())
        })?;

        info!("engine initialized, bootstrap administrator is {BOOTSTRAP_ADMIN_USER_ID}");
        Ok(())
    }

    fn acting_user_id(&self) -> Result<String, ApiError> {
        self.identity
            .acting_user_id()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::Precondition("acting user id is missing".to_string()))
    }

    fn assert_privilege(&self, acting_user_id: &str, required: Privilege) -> Result<(), ApiError> {
        PrivilegeGuard::new(self.store.as_ref()).assert_privilege(acting_user_id, required)
    }

    /// Audit-wrap `callback` under `locus` after checking that the actor holds
    /// `required`. The summary is `"{actor}:{operation}"`.
    fn audited<T, F>(
        &self,
        acting_user_id: &str,
        locus: &str,
        operation: &str,
        required: Privilege,
        begin_detail: String,
        callback: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce(&mut AuditDetails<'_>) -> Result<T, ApiError>,
    {
        let summary = format!("{acting_user_id}:{operation}");
        self.audit.wrap(acting_user_id, locus, &summary, &begin_detail, |details| {
            self.assert_privilege(acting_user_id, required)?;
            callback(details)
        })
    }

    fn system_admins(&self) -> Result<BTreeSet<String>, ApiError> {
        self.store.all_user_ids_with_privilege(Privilege::SystemAdmin)
    }
}

/// Direction of a privilege change, for reporting SystemAdmin escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    Granted,
    Revoked,
}

/// Report each user whose SystemAdmin status changed between `before` and
/// `after` in the given direction.
fn report_escalation(
    details: &mut AuditDetails<'_>,
    direction: Escalation,
    role_id: &str,
    before: &BTreeSet<String>,
    after: &BTreeSet<String>,
) -> Result<(), ApiError> {
    let (changed, verb) = match direction {
        Escalation::Granted => (after.difference(before), "granted"),
        Escalation::Revoked => (before.difference(after), "revoked"),
    };
    for user_id in changed {
        details.report(format!("user {user_id} has been {verb} admin via role {role_id}"))?;
    }
    Ok(())
}
