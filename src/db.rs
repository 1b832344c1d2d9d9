use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use include_dir::{include_dir, Dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::Migrations;
use tracing::{debug, info, trace};
use crate::data::audit::{AuditLogEntry, AuditLogQuery};
use crate::data::enums::Privilege;
use crate::data::objects::{Certificate, Role, User, UserRole};
use crate::dialect::{SqlDialect, SqliteDialect};
use crate::settings::DataStoreSettings;
use crate::transaction::{TransactionControl, TransactionCoordinator};
use crate::ApiError;

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Tables in the order they can be dropped without violating foreign keys.
const TABLES: [&str; 6] = ["AuditLog", "Certificate", "RolePrivilege", "UserRole", "Role", "User"];

/// Persistence operations the engine depends on.
pub trait DataStore: Send + Sync {
    /// Run `callback` in one atomic unit of work; commit unless it fails.
    fn transaction_wrap(&self, callback: &mut dyn FnMut() -> Result<(), ApiError>) -> Result<(), ApiError>;
    /// Run `callback` in one atomic unit of work; commit iff it returns `true`.
    fn transaction_wrap_bool(&self, callback: &mut dyn FnMut() -> Result<bool, ApiError>) -> Result<bool, ApiError>;
    fn in_transaction(&self) -> bool;

    /// Create missing tables. Safe to call repeatedly.
    fn initialize(&self) -> Result<(), ApiError>;
    /// Drop every table. Test use only.
    fn zap(&self) -> Result<(), ApiError>;

    fn exists_user(&self, user_id: &str) -> Result<bool, ApiError>;
    fn insert_user(&self, user: &User) -> Result<(), ApiError>;
    fn update_user(&self, user: &User) -> Result<(), ApiError>;
    fn fetch_user(&self, user_id: &str) -> Result<Option<User>, ApiError>;
    fn delete_user(&self, user_id: &str) -> Result<(), ApiError>;
    fn get_user_role_memberships(&self, user_id: &str) -> Result<Vec<String>, ApiError>;

    fn exists_role(&self, role_id: &str) -> Result<bool, ApiError>;
    fn insert_role(&self, role: &Role) -> Result<(), ApiError>;
    fn update_role(&self, role: &Role) -> Result<(), ApiError>;
    fn fetch_role(&self, role_id: &str) -> Result<Option<Role>, ApiError>;
    fn delete_role(&self, role_id: &str) -> Result<(), ApiError>;

    fn exists_user_role(&self, user_id: &str, role_id: &str) -> Result<bool, ApiError>;
    /// Insert the membership if absent. Returns whether a row was added.
    fn persist_user_role(&self, user_role: &UserRole) -> Result<bool, ApiError>;
    fn delete_user_role(&self, user_id: &str, role_id: &str) -> Result<(), ApiError>;
    fn fetch_all_user_roles(&self) -> Result<Vec<UserRole>, ApiError>;
    fn exists_users_in_role(&self, role_id: &str) -> Result<bool, ApiError>;

    fn exists_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<bool, ApiError>;
    fn insert_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError>;
    fn delete_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError>;
    fn exists_user_in_role_with_privilege(&self, user_id: &str, privilege: Privilege) -> Result<bool, ApiError>;
    fn all_user_ids_with_privilege(&self, privilege: Privilege) -> Result<BTreeSet<String>, ApiError>;
    fn exists_role_privileges_for_role(&self, role_id: &str) -> Result<bool, ApiError>;

    fn exists_certificate(&self, certificate_id: &str) -> Result<bool, ApiError>;
    fn insert_certificate(&self, certificate: &Certificate) -> Result<(), ApiError>;
    fn fetch_certificate(&self, certificate_id: &str) -> Result<Option<Certificate>, ApiError>;

    fn insert_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), ApiError>;
    fn fetch_audit_entries(&self, query: &AuditLogQuery) -> Result<Vec<AuditLogEntry>, ApiError>;
}

/// Run `callback` inside `store.transaction_wrap` and hand back its value.
pub fn in_transaction<T, F>(store: &dyn DataStore, callback: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError>,
{
    let mut callback = Some(callback);
    let mut value = None;
    store.transaction_wrap(&mut || {
        let callback = callback
            .take()
            .ok_or_else(|| ApiError::Precondition("transaction callback invoked twice".to_string()))?;
        value = Some(callback()?);
        Ok(())
    })?;
    value.ok_or_else(|| ApiError::Precondition("transaction callback was not invoked".to_string()))
}

/// SQLite backed store. The pool holds at most one connection, opened on
/// first use and kept for the lifetime of the store.
pub struct CaApiDB {
    dialect: Box<dyn SqlDialect>,
    pool: Pool<SqliteConnectionManager>,
    transactions: TransactionCoordinator,
}

impl CaApiDB {
    pub fn new(dialect: impl SqlDialect + 'static) -> Self {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .idle_timeout(None)
            .max_lifetime(None)
            .build_unchecked(dialect.connection_manager());

        Self {
            dialect: Box::new(dialect),
            pool,
            transactions: TransactionCoordinator::new(),
        }
    }

    pub fn from_settings(settings: &DataStoreSettings) -> Self {
        debug!(backend = ?settings.backend, "opening data store");
        Self::new(SqliteDialect::from_backend(&settings.backend))
    }

    pub fn in_memory() -> Self {
        Self::new(SqliteDialect::Memory)
    }

    pub fn transaction_depth(&self) -> usize {
        self.transactions.depth()
    }

    fn with_conn<T>(&self, operation: impl FnOnce(&Connection) -> Result<T, ApiError>) -> Result<T, ApiError> {
        let conn = self.pool.get()?;
        operation(&conn)
    }

    fn exists(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<bool, ApiError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
            Ok(count > 0)
        })
    }

    fn user_from_row(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            user_id: row.get(0)?,
            friendly_name: row.get(1)?,
            is_active: row.get(2)?,
        })
    }

    fn role_from_row(row: &Row) -> rusqlite::Result<Role> {
        Ok(Role {
            role_id: row.get(0)?,
            friendly_name: row.get(1)?,
        })
    }

    fn certificate_from_row(row: &Row) -> rusqlite::Result<Certificate> {
        Ok(Certificate {
            certificate_id: row.get(0)?,
            issuer_certificate_id: row.get(1)?,
            is_active: row.get(2)?,
            serial_number: row.get(3)?,
            thumbprint: row.get(4)?,
            subject: row.get(5)?,
            issuer: row.get(6)?,
            description: row.get(7)?,
            common_name: row.get(8)?,
            country_code: row.get(9)?,
            state_code: row.get(10)?,
            locale: row.get(11)?,
            organization: row.get(12)?,
            organizational_unit: row.get(13)?,
            not_before: timestamp_from_column(row, 14, DateTime::from_timestamp(row.get(14)?, 0))?,
            not_after: timestamp_from_column(row, 15, DateTime::from_timestamp(row.get(15)?, 0))?,
            pkcs12: row.get(16)?,
        })
    }

    fn audit_entry_from_row(row: &Row) -> rusqlite::Result<AuditLogEntry> {
        Ok(AuditLogEntry {
            correlation_id: row.get(0)?,
            entry_type: row.get(1)?,
            occurrence_utc: timestamp_from_column(row, 2, DateTime::from_timestamp_millis(row.get(2)?))?,
            acting_user_id: row.get(3)?,
            locus: row.get(4)?,
            summary: row.get(5)?,
            detail: row.get(6)?,
        })
    }
}

fn timestamp_from_column(row: &Row, index: usize, value: Option<DateTime<Utc>>) -> rusqlite::Result<DateTime<Utc>> {
    value.ok_or_else(|| {
        let raw: i64 = row.get(index).unwrap_or_default();
        rusqlite::Error::IntegralValueOutOfRange(index, raw)
    })
}

impl TransactionControl for CaApiDB {
    fn begin(&self) -> Result<(), ApiError> {
        self.with_conn(|conn| Ok(conn.execute_batch("BEGIN IMMEDIATE")?))
    }

    fn commit(&self) -> Result<(), ApiError> {
        self.with_conn(|conn| Ok(conn.execute_batch("COMMIT")?))
    }

    fn rollback(&self) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            Ok(())
        })
    }
}

impl DataStore for CaApiDB {
    fn transaction_wrap(&self, callback: &mut dyn FnMut() -> Result<(), ApiError>) -> Result<(), ApiError> {
        self.transactions.wrap(self, callback)
    }

    fn transaction_wrap_bool(&self, callback: &mut dyn FnMut() -> Result<bool, ApiError>) -> Result<bool, ApiError> {
        self.transactions.wrap_bool(self, callback)
    }

    fn in_transaction(&self) -> bool {
        self.transactions.is_open()
    }

    fn initialize(&self) -> Result<(), ApiError> {
        let mut conn = self.pool.get()?;
        let migrations = Migrations::from_directory(&MIGRATIONS_DIR)?;
        migrations.to_latest(&mut conn)?;
        info!("data store schema is up to date");
        Ok(())
    }

    fn zap(&self) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            for table in TABLES {
                if self.dialect.table_exists(conn, table)? {
                    trace!(table, "dropping table");
                    conn.execute_batch(&format!("DROP TABLE {}", self.dialect.quote_identifier(table)))?;
                }
            }
            conn.pragma_update(None, "user_version", 0)?;
            info!("data store zapped");
            Ok(())
        })
    }

    fn exists_user(&self, user_id: &str) -> Result<bool, ApiError> {
        self.exists("SELECT COUNT(1) FROM \"User\" WHERE \"UserId\" = ?1", params![user_id])
    }

    fn insert_user(&self, user: &User) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO \"User\" (\"UserId\", \"FriendlyName\", \"IsActive\") VALUES (?1, ?2, ?3)",
                params![user.user_id, user.friendly_name, user.is_active],
            )?;
            Ok(())
        })
    }

    fn update_user(&self, user: &User) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE \"User\" SET \"FriendlyName\" = ?1, \"IsActive\" = ?2 WHERE \"UserId\" = ?3",
                params![user.friendly_name, user.is_active, user.user_id],
            )?;
            Ok(())
        })
    }

    fn fetch_user(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT \"UserId\", \"FriendlyName\", \"IsActive\" FROM \"User\" WHERE \"UserId\" = ?1",
                params![user_id],
                Self::user_from_row,
            ).optional()?)
        })
    }

    fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM \"User\" WHERE \"UserId\" = ?1", params![user_id])?;
            Ok(())
        })
    }

    fn get_user_role_memberships(&self, user_id: &str) -> Result<Vec<String>, ApiError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT \"RoleId\" FROM \"UserRole\" WHERE \"UserId\" = ?1 ORDER BY \"RoleId\"",
            )?;
            let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
            Ok(rows.collect::<Result<Vec<String>, _>>()?)
        })
    }

    fn exists_role(&self, role_id: &str) -> Result<bool, ApiError> {
        self.exists("SELECT COUNT(1) FROM \"Role\" WHERE \"RoleId\" = ?1", params![role_id])
    }

    fn insert_role(&self, role: &Role) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO \"Role\" (\"RoleId\", \"FriendlyName\") VALUES (?1, ?2)",
                params![role.role_id, role.friendly_name],
            )?;
            Ok(())
        })
    }

    fn update_role(&self, role: &Role) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE \"Role\" SET \"FriendlyName\" = ?1 WHERE \"RoleId\" = ?2",
                params![role.friendly_name, role.role_id],
            )?;
            Ok(())
        })
    }

    fn fetch_role(&self, role_id: &str) -> Result<Option<Role>, ApiError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT \"RoleId\", \"FriendlyName\" FROM \"Role\" WHERE \"RoleId\" = ?1",
                params![role_id],
                Self::role_from_row,
            ).optional()?)
        })
    }

    fn delete_role(&self, role_id: &str) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM \"Role\" WHERE \"RoleId\" = ?1", params![role_id])?;
            Ok(())
        })
    }

    fn exists_user_role(&self, user_id: &str, role_id: &str) -> Result<bool, ApiError> {
        self.exists(
            "SELECT COUNT(1) FROM \"UserRole\" WHERE \"UserId\" = ?1 AND \"RoleId\" = ?2",
            params![user_id, role_id],
        )
    }

    fn persist_user_role(&self, user_role: &UserRole) -> Result<bool, ApiError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO \"UserRole\" (\"UserId\", \"RoleId\") VALUES (?1, ?2)",
                params![user_role.user_id, user_role.role_id],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_user_role(&self, user_id: &str, role_id: &str) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM \"UserRole\" WHERE \"UserId\" = ?1 AND \"RoleId\" = ?2",
                params![user_id, role_id],
            )?;
            Ok(())
        })
    }

    fn fetch_all_user_roles(&self) -> Result<Vec<UserRole>, ApiError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT \"UserId\", \"RoleId\" FROM \"UserRole\" ORDER BY \"UserId\", \"RoleId\"",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(UserRole {
                    user_id: row.get(0)?,
                    role_id: row.get(1)?,
                })
            })?;

            let mut user_roles = Vec::new();
            for user_role in rows {
                user_roles.push(user_role?);
            }
            Ok(user_roles)
        })
    }

    fn exists_users_in_role(&self, role_id: &str) -> Result<bool, ApiError> {
        self.exists("SELECT COUNT(1) FROM \"UserRole\" WHERE \"RoleId\" = ?1", params![role_id])
    }

    fn exists_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<bool, ApiError> {
        self.exists(
            "SELECT COUNT(1) FROM \"RolePrivilege\" WHERE \"RoleId\" = ?1 AND \"PrivilegeId\" = ?2",
            params![role_id, privilege],
        )
    }

    fn insert_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO \"RolePrivilege\" (\"RoleId\", \"PrivilegeId\") VALUES (?1, ?2)",
                params![role_id, privilege],
            )?;
            Ok(())
        })
    }

    fn delete_role_privilege(&self, role_id: &str, privilege: Privilege) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM \"RolePrivilege\" WHERE \"RoleId\" = ?1 AND \"PrivilegeId\" = ?2",
                params![role_id, privilege],
            )?;
            Ok(())
        })
    }

    fn exists_user_in_role_with_privilege(&self, user_id: &str, privilege: Privilege) -> Result<bool, ApiError> {
        self.exists(
            "SELECT COUNT(1) FROM \"RolePrivilege\" rp \
             JOIN \"UserRole\" ur ON rp.\"RoleId\" = ur.\"RoleId\" \
             WHERE ur.\"UserId\" = ?1 AND rp.\"PrivilegeId\" = ?2",
            params![user_id, privilege],
        )
    }

    fn all_user_ids_with_privilege(&self, privilege: Privilege) -> Result<BTreeSet<String>, ApiError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT ur.\"UserId\" FROM \"RolePrivilege\" rp \
                 JOIN \"UserRole\" ur ON rp.\"RoleId\" = ur.\"RoleId\" \
                 WHERE rp.\"PrivilegeId\" = ?1",
            )?;
            let rows = stmt.query_map(params![privilege], |row| row.get(0))?;
            Ok(rows.collect::<Result<BTreeSet<String>, _>>()?)
        })
    }

    fn exists_role_privileges_for_role(&self, role_id: &str) -> Result<bool, ApiError> {
        self.exists("SELECT COUNT(1) FROM \"RolePrivilege\" WHERE \"RoleId\" = ?1", params![role_id])
    }

    fn exists_certificate(&self, certificate_id: &str) -> Result<bool, ApiError> {
        self.exists(
            "SELECT COUNT(1) FROM \"Certificate\" WHERE \"CertificateId\" = ?1",
            params![certificate_id],
        )
    }

    fn insert_certificate(&self, certificate: &Certificate) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO \"Certificate\" (\"CertificateId\", \"IssuerCertificateId\", \"IsActive\", \"SerialNumber\", \
                 \"ThumbPrint\", \"Subject\", \"Issuer\", \"Description\", \"CommonName\", \"CountryCode\", \"StateCode\", \
                 \"Locale\", \"Organization\", \"OrganizationalUnit\", \"NotBefore\", \"NotAfter\", \"Pkcs12BinaryWithPrivateKey\") \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    certificate.certificate_id, certificate.issuer_certificate_id, certificate.is_active,
                    certificate.serial_number, certificate.thumbprint, certificate.subject, certificate.issuer,
                    certificate.description, certificate.common_name, certificate.country_code,
                    certificate.state_code, certificate.locale, certificate.organization,
                    certificate.organizational_unit, certificate.not_before.timestamp(),
                    certificate.not_after.timestamp(), certificate.pkcs12
                ],
            )?;
            Ok(())
        })
    }

    fn fetch_certificate(&self, certificate_id: &str) -> Result<Option<Certificate>, ApiError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT \"CertificateId\", \"IssuerCertificateId\", \"IsActive\", \"SerialNumber\", \"ThumbPrint\", \
                 \"Subject\", \"Issuer\", \"Description\", \"CommonName\", \"CountryCode\", \"StateCode\", \"Locale\", \
                 \"Organization\", \"OrganizationalUnit\", \"NotBefore\", \"NotAfter\", \"Pkcs12BinaryWithPrivateKey\" \
                 FROM \"Certificate\" WHERE \"CertificateId\" = ?1",
                params![certificate_id],
                Self::certificate_from_row,
            ).optional()?)
        })
    }

    fn insert_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO \"AuditLog\" (\"CorrelationId\", \"EntryType\", \"OccurrenceUtc\", \"ActingUserId\", \
                 \"Locus\", \"Summary\", \"Detail\") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.correlation_id, entry.entry_type, entry.occurrence_utc.timestamp_millis(),
                    entry.acting_user_id, entry.locus, entry.summary, entry.detail
                ],
            )?;
            Ok(())
        })
    }

    /// Read audit entries back in insertion order, filtered by any field set on `query`.
    fn fetch_audit_entries(&self, query: &AuditLogQuery) -> Result<Vec<AuditLogEntry>, ApiError> {
        let q = |name: &str| self.dialect.quote_identifier(name);
        let mut sql = format!(
            "SELECT {}, {}, {}, {}, {}, {}, {} FROM {} WHERE 1=1",
            q("CorrelationId"), q("EntryType"), q("OccurrenceUtc"), q("ActingUserId"),
            q("Locus"), q("Summary"), q("Detail"), q("AuditLog")
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let text_filters = [
            ("Locus", &query.locus),
            ("CorrelationId", &query.correlation_id),
            ("ActingUserId", &query.acting_user_id),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value {
                params.push(Box::new(value.clone()));
                sql.push_str(&format!(" AND {} = {}", q(column), self.dialect.parameter(params.len())));
            }
        }

        if let Some(entry_type) = query.entry_type {
            params.push(Box::new(entry_type));
            sql.push_str(&format!(" AND {} = {}", q("EntryType"), self.dialect.parameter(params.len())));
        }

        sql.push_str(&format!(" ORDER BY {}", q("AuditLogId")));

        if let Some(limit) = query.limit {
            params.push(Box::new(limit));
            sql.push_str(&format!(" LIMIT {}", self.dialect.parameter(params.len())));
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt.query_map(param_refs.as_slice(), Self::audit_entry_from_row)?;

            let mut entries = Vec::new();
            for entry in rows {
                entries.push(entry?);
            }
            Ok(entries)
        })
    }
}
