use tracing::info;
use crate::data::audit::Locus;
use crate::data::enums::Privilege;
use crate::data::objects::{Role, RolePrivilege, User, UserRole};
use crate::db::in_transaction;
use crate::helper::{assert_not_blank, string_list};
use crate::ApiError;
use super::{report_escalation, ApplicationEngine, Escalation};

fn user_missing(user_id: &str) -> ApiError {
    ApiError::DomainConflict(format!("User {user_id} does not exist"))
}

fn role_missing(role_id: &str) -> ApiError {
    ApiError::DomainConflict(format!("Role {role_id} does not exist"))
}

impl ApplicationEngine {
    pub fn create_user(&self, user: &User) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        user.validate()?;

        self.audited(
            &actor,
            Locus::USER_CREATE,
            "CreateUser",
            Privilege::SystemAdmin,
            format!("{actor} is creating user:[{}]", user.user_id),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if store.exists_user(&user.user_id)? {
                        return Err(ApiError::DomainConflict(format!("User {} already exists", user.user_id)));
                    }
                    store.insert_user(user)
                })?;
                info!(user_id = %user.user_id, "user created");
                Ok(())
            },
        )
    }

    pub fn update_user(&self, user: &User) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        user.validate()?;

        self.audited(
            &actor,
            Locus::USER_UPDATE,
            "UpdateUser",
            Privilege::SystemAdmin,
            format!("{actor} is updating user:[{}]", user.user_id),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_user(&user.user_id)? {
                        return Err(user_missing(&user.user_id));
                    }
                    store.update_user(user)
                })
            },
        )
    }

    /// Remove a user. Users that still belong to a role are refused.
    pub fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(user_id, "UserId")?;

        self.audited(
            &actor,
            Locus::USER_DELETE,
            "DeleteUser",
            Privilege::SystemAdmin,
            format!("{actor} is deleting user:[{user_id}]"),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    let memberships = store.get_user_role_memberships(user_id)?;
                    if !memberships.is_empty() {
                        return Err(ApiError::DomainConflict(format!(
                            "User {user_id} belongs to role(s): [{}]",
                            string_list(&memberships)
                        )));
                    }
                    if !store.exists_user(user_id)? {
                        return Err(user_missing(user_id));
                    }
                    store.delete_user(user_id)
                })?;
                info!(user_id, "user deleted");
                Ok(())
            },
        )
    }

    pub fn exists_user(&self, user_id: &str) -> Result<bool, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(user_id, "UserId")?;

        self.audited(
            &actor,
            Locus::USER_FETCH,
            "ExistsUser",
            Privilege::SystemAdmin,
            format!("{actor} is checking existence of user:[{user_id}]"),
            |_| self.store.exists_user(user_id),
        )
    }

    pub fn fetch_user(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(user_id, "UserId")?;

        self.audited(
            &actor,
            Locus::USER_FETCH,
            "FetchUser",
            Privilege::SystemAdmin,
            format!("{actor} is fetching user:[{user_id}]"),
            |_| self.store.fetch_user(user_id),
        )
    }

    /// Whether `user_id` holds `privilege` through any of its roles.
    pub fn user_has_privilege(&self, user_id: &str, privilege: Privilege) -> Result<bool, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(user_id, "UserId")?;

        self.audited(
            &actor,
            Locus::USER_CHECK_PRIVILEGE,
            "UserHasPrivilege",
            Privilege::SystemAdmin,
            format!("{actor} is checking privilege {privilege} for user:[{user_id}]"),
            |_| self.store.exists_user_in_role_with_privilege(user_id, privilege),
        )
    }

    pub fn create_role(&self, role: &Role) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        role.validate()?;

        self.audited(
            &actor,
            Locus::ROLE_CREATE,
            "CreateRole",
            Privilege::SystemAdmin,
            format!("{actor} is creating role:[{}]", role.role_id),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if store.exists_role(&role.role_id)? {
                        return Err(ApiError::DomainConflict(format!("Role {} already exists", role.role_id)));
                    }
                    store.insert_role(role)
                })?;
                info!(role_id = %role.role_id, "role created");
                Ok(())
            },
        )
    }

    pub fn update_role(&self, role: &Role) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        role.validate()?;

        self.audited(
            &actor,
            Locus::ROLE_UPDATE,
            "UpdateRole",
            Privilege::SystemAdmin,
            format!("{actor} is updating role:[{}]", role.role_id),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_role(&role.role_id)? {
                        return Err(role_missing(&role.role_id));
                    }
                    store.update_role(role)
                })
            },
        )
    }

    /// Remove a role. Roles with members or privilege grants are refused.
    pub fn delete_role(&self, role_id: &str) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(role_id, "RoleId")?;

        self.audited(
            &actor,
            Locus::ROLE_DELETE,
            "DeleteRole",
            Privilege::SystemAdmin,
            format!("{actor} is deleting role:[{role_id}]"),
            |_| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_role(role_id)? {
                        return Err(role_missing(role_id));
                    }
                    if store.exists_users_in_role(role_id)? {
                        return Err(ApiError::DomainConflict(format!("Role {role_id} contains users")));
                    }
                    if store.exists_role_privileges_for_role(role_id)? {
                        return Err(ApiError::DomainConflict(format!("Role {role_id} contains privilege grants")));
                    }
                    store.delete_role(role_id)
                })?;
                info!(role_id, "role deleted");
                Ok(())
            },
        )
    }

    pub fn exists_role(&self, role_id: &str) -> Result<bool, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(role_id, "RoleId")?;

        self.audited(
            &actor,
            Locus::ROLE_FETCH,
            "ExistsRole",
            Privilege::SystemAdmin,
            format!("{actor} is checking existence of role:[{role_id}]"),
            |_| self.store.exists_role(role_id),
        )
    }

    pub fn fetch_role(&self, role_id: &str) -> Result<Option<Role>, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(role_id, "RoleId")?;

        self.audited(
            &actor,
            Locus::ROLE_FETCH,
            "FetchRole",
            Privilege::SystemAdmin,
            format!("{actor} is fetching role:[{role_id}]"),
            |_| self.store.fetch_role(role_id),
        )
    }

    /// Add every listed user to the role, all or nothing. Users that become
    /// SystemAdmin holders through the change are reported on the audit trail.
    pub fn add_user_ids_to_role<S: AsRef<str>>(&self, role_id: &str, user_ids: &[S]) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(role_id, "RoleId")?;
        let memberships = user_ids
            .iter()
            .map(|user_id| UserRole::new(user_id.as_ref(), role_id))
            .collect::<Vec<_>>();
        for membership in &memberships {
            membership.validate()?;
        }
        if memberships.is_empty() {
            return Ok(());
        }

        self.audited(
            &actor,
            Locus::ROLE_UPDATE,
            "AddUserIdsToRole",
            Privilege::SystemAdmin,
            format!("{actor} is adding user ids [{}] to role:[{role_id}]", string_list(user_ids)),
            |details| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_role(role_id)? {
                        return Err(role_missing(role_id));
                    }
                    let before = self.system_admins()?;
                    for membership in &memberships {
                        let user_id = membership.user_id.as_str();
                        if !store.exists_user(user_id)? {
                            return Err(user_missing(user_id));
                        }
                        if store.exists_user_role(user_id, role_id)? {
                            return Err(ApiError::DomainConflict(format!(
                                "User {user_id} is already a member of role {role_id}"
                            )));
                        }
                        store.persist_user_role(membership)?;
                    }
                    let after = self.system_admins()?;
                    report_escalation(details, Escalation::Granted, role_id, &before, &after)
                })
            },
        )
    }

    /// Remove every listed user from the role, all or nothing. Users that lose
    /// SystemAdmin through the change are reported on the audit trail.
    pub fn remove_user_ids_from_role<S: AsRef<str>>(&self, role_id: &str, user_ids: &[S]) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(role_id, "RoleId")?;
        let memberships = user_ids
            .iter()
            .map(|user_id| UserRole::new(user_id.as_ref(), role_id))
            .collect::<Vec<_>>();
        for membership in &memberships {
            membership.validate()?;
        }
        if memberships.is_empty() {
            return Ok(());
        }

        self.audited(
            &actor,
            Locus::ROLE_UPDATE,
            "RemoveUserIdsFromRole",
            Privilege::SystemAdmin,
            format!("{actor} is removing user ids [{}] from role:[{role_id}]", string_list(user_ids)),
            |details| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_role(role_id)? {
                        return Err(role_missing(role_id));
                    }
                    let before = self.system_admins()?;
                    for membership in &memberships {
                        let user_id = membership.user_id.as_str();
                        if !store.exists_user(user_id)? {
                            return Err(user_missing(user_id));
                        }
                        if !store.exists_user_role(user_id, role_id)? {
                            return Err(ApiError::DomainConflict(format!(
                                "User {user_id} is not a member of role {role_id}"
                            )));
                        }
                        store.delete_user_role(user_id, role_id)?;
                    }
                    let after = self.system_admins()?;
                    report_escalation(details, Escalation::Revoked, role_id, &before, &after)
                })
            },
        )
    }

    pub fn exists_user_in_role(&self, user_id: &str, role_id: &str) -> Result<bool, ApiError> {
        let actor = self.acting_user_id()?;
        assert_not_blank(user_id, "UserId")?;
        assert_not_blank(role_id, "RoleId")?;

        self.audited(
            &actor,
            Locus::ROLE_FETCH,
            "ExistsUserInRole",
            Privilege::SystemAdmin,
            format!("{actor} is checking membership of user:[{user_id}] in role:[{role_id}]"),
            |_| self.store.exists_user_role(user_id, role_id),
        )
    }

    pub fn fetch_all_user_roles(&self) -> Result<Vec<UserRole>, ApiError> {
        let actor = self.acting_user_id()?;

        self.audited(
            &actor,
            Locus::USER_ROLE_FETCH,
            "FetchAllUserRoles",
            Privilege::SystemAdmin,
            format!("{actor} is fetching all user roles"),
            |_| self.store.fetch_all_user_roles(),
        )
    }

    pub fn grant_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        RolePrivilege::new(role_id, privilege).validate()?;

        self.audited(
            &actor,
            Locus::ROLE_GRANT,
            "GrantRolePrivilege",
            Privilege::SystemAdmin,
            format!("{actor} is granting privilege {privilege} to role:[{role_id}]"),
            |details| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    if !store.exists_role(role_id)? {
                        return Err(role_missing(role_id));
                    }
                    if store.exists_role_privilege(role_id, privilege)? {
                        return Err(ApiError::DomainConflict(format!(
                            "Role {role_id} already holds privilege {privilege}"
                        )));
                    }
                    let before = self.system_admins()?;
                    store.insert_role_privilege(role_id, privilege)?;
                    let after = self.system_admins()?;
                    report_escalation(details, Escalation::Granted, role_id, &before, &after)
                })
            },
        )
    }

    /// Withdraw a privilege from a role. Revoking a grant that does not exist
    /// succeeds without change.
    pub fn revoke_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError> {
        let actor = self.acting_user_id()?;
        RolePrivilege::new(role_id, privilege).validate()?;

        self.audited(
            &actor,
            Locus::ROLE_REVOKE,
            "RevokeRolePrivilege",
            Privilege::SystemAdmin,
            format!("{actor} is revoking privilege {privilege} from role:[{role_id}]"),
            |details| {
                let store = self.store.as_ref();
                in_transaction(store, || {
                    let before = self.system_admins()?;
                    store.delete_role_privilege(role_id, privilege)?;
                    let after = self.system_admins()?;
                    report_escalation(details, Escalation::Revoked, role_id, &before, &after)
                })
            },
        )
    }
}
