pub const BOOTSTRAP_ADMIN_USER_ID: &str = "u.system.admin";
pub const BOOTSTRAP_ADMIN_USER_NAME: &str = "System Admin User";
pub const BOOTSTRAP_ADMIN_ROLE_ID: &str = "r.system.admin";
pub const BOOTSTRAP_ADMIN_ROLE_NAME: &str = "System Admin Role";

pub(crate) const SETTINGS_FILE_PATH: &str = "settings.json";

pub(crate) const ENV_SETTINGS_PATH: &str = "CAAPI_SETTINGS";
pub(crate) const ENV_DB_PATH: &str = "CAAPI_DB_PATH";
pub(crate) const ENV_LOG_FILTER: &str = "CAAPI_LOG";

pub(crate) const AUDIT_SUCCESS_DETAIL: &str = "SUCCESS";
pub(crate) const AUDIT_TARGET: &str = "caapi::audit";
