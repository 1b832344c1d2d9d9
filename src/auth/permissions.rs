use tracing::{debug, warn};
use crate::constants::{BOOTSTRAP_ADMIN_ROLE_ID, BOOTSTRAP_ADMIN_USER_ID};
use crate::data::enums::Privilege;
use crate::db::DataStore;
use crate::ApiError;

/// Decides whether an acting user holds a privilege.
pub struct PrivilegeGuard<'a> {
    store: &'a dyn DataStore,
}

impl<'a> PrivilegeGuard<'a> {
    pub fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Allow the bootstrap admin, members of the bootstrap admin role, and
    /// active users holding `required` through any role. Deny everyone else.
    pub fn assert_privilege(&self, acting_user_id: &str, required: Privilege) -> Result<(), ApiError> {
        if acting_user_id.trim().is_empty() {
            return Err(ApiError::Precondition("acting user id is missing".to_string()));
        }

        let user = match self.store.fetch_user(acting_user_id)? {
            Some(user) => user,
            None => {
                warn!("unknown user {acting_user_id} requested {required}");
                return Err(ApiError::AccessDenied(format!("user {acting_user_id} does not exist")));
            }
        };
        if !user.is_active {
            warn!("inactive user {acting_user_id} requested {required}");
            return Err(ApiError::AccessDenied(format!("user {acting_user_id} is not active")));
        }

        if acting_user_id == BOOTSTRAP_ADMIN_USER_ID {
            return Ok(());
        }
        if self.store.exists_user_role(acting_user_id, BOOTSTRAP_ADMIN_ROLE_ID)? {
            return Ok(());
        }
        if self.store.exists_user_in_role_with_privilege(acting_user_id, required)? {
            return Ok(());
        }

        debug!("user {acting_user_id} is missing privilege {required}");
        Err(ApiError::AccessDenied(format!("user {acting_user_id} lacks privilege {required}")))
    }
}
