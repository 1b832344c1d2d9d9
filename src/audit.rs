use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{error, info};
use uuid::Uuid;
use crate::constants::{AUDIT_SUCCESS_DETAIL, AUDIT_TARGET};
use crate::data::audit::AuditLogEntry;
use crate::data::enums::AuditEntryType;
use crate::db::DataStore;
use crate::helper::{assert_not_blank, is_blank};
use crate::ApiError;

/// Sink for audit entries. A failing sink fails the operation being audited.
pub trait AuditLogWriter: Send + Sync {
    fn write(&self, entry: &AuditLogEntry) -> Result<(), ApiError>;
}

/// Emits each entry as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogWriter;

impl AuditLogWriter for TracingAuditLogWriter {
    fn write(&self, entry: &AuditLogEntry) -> Result<(), ApiError> {
        info!(
            target: AUDIT_TARGET,
            correlation_id = %entry.correlation_id,
            entry_type = %entry.entry_type,
            occurrence_utc = %entry.occurrence_utc.to_rfc3339(),
            acting_user_id = %entry.acting_user_id,
            locus = %entry.locus,
            summary = %entry.summary,
            "{}", entry.detail
        );
        Ok(())
    }
}

/// Keeps entries in memory, mostly for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLogWriter {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_for_locus(&self, locus: &str) -> Vec<AuditLogEntry> {
        self.entries.lock().iter().filter(|e| e.locus == locus).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl AuditLogWriter for MemoryAuditLogWriter {
    fn write(&self, entry: &AuditLogEntry) -> Result<(), ApiError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Persists entries to the store's audit table.
pub struct StoreAuditLogWriter {
    store: Arc<dyn DataStore>,
}

impl StoreAuditLogWriter {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

impl AuditLogWriter for StoreAuditLogWriter {
    fn write(&self, entry: &AuditLogEntry) -> Result<(), ApiError> {
        self.store.insert_audit_entry(entry)
    }
}

/// Writes every entry to each inner writer, stopping at the first failure.
#[derive(Default)]
pub struct FanOutAuditLogWriter {
    writers: Vec<Arc<dyn AuditLogWriter>>,
}

impl FanOutAuditLogWriter {
    pub fn new(writers: Vec<Arc<dyn AuditLogWriter>>) -> Self {
        Self { writers }
    }
}

impl AuditLogWriter for FanOutAuditLogWriter {
    fn write(&self, entry: &AuditLogEntry) -> Result<(), ApiError> {
        for writer in &self.writers {
            writer.write(entry)?;
        }
        Ok(())
    }
}

/// Correlated Begin / Processing / Success / Failure logging around an operation.
#[derive(Clone)]
pub struct AuditTrail {
    writer: Arc<dyn AuditLogWriter>,
}

impl AuditTrail {
    pub fn new(writer: Arc<dyn AuditLogWriter>) -> Self {
        Self { writer }
    }

    /// Run `callback` between a Begin entry and exactly one Success or Failure
    /// entry. The callback receives a collector for Processing entries. Errors
    /// from the callback are recorded and returned unchanged.
    pub fn wrap<T, F>(
        &self,
        acting_user_id: &str,
        locus: &str,
        summary: &str,
        begin_detail: &str,
        callback: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce(&mut AuditDetails<'_>) -> Result<T, ApiError>,
    {
        if is_blank(acting_user_id) {
            return Err(ApiError::Precondition("acting user id is missing".to_string()));
        }
        assert_not_blank(locus, "locus")?;
        assert_not_blank(summary, "summary")?;
        assert_not_blank(begin_detail, "beginDetail")?;

        let mut details = AuditDetails {
            writer: self.writer.as_ref(),
            correlation_id: Uuid::new_v4().to_string(),
            acting_user_id,
            locus,
            summary,
            reported: 0,
        };

        let outcome = match details.emit(AuditEntryType::Begin, begin_detail.to_string()) {
            Ok(()) => callback(&mut details),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => match details.emit(AuditEntryType::Success, AUDIT_SUCCESS_DETAIL.to_string()) {
                Ok(()) => Ok(value),
                Err(sink_error) => {
                    details.record_failure(&sink_error);
                    Err(sink_error)
                }
            },
            Err(e) => {
                details.record_failure(&e);
                Err(e)
            }
        }
    }
}

/// Handle passed into audited operations for reporting Processing entries
/// under the current correlation id.
pub struct AuditDetails<'a> {
    writer: &'a dyn AuditLogWriter,
    correlation_id: String,
    acting_user_id: &'a str,
    locus: &'a str,
    summary: &'a str,
    reported: usize,
}

impl AuditDetails<'_> {
    pub fn report(&mut self, detail: impl Into<String>) -> Result<(), ApiError> {
        let detail = detail.into();
        assert_not_blank(&detail, "detail")?;
        self.emit(AuditEntryType::Processing, detail)?;
        self.reported += 1;
        Ok(())
    }

    /// Processing entries reported so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    fn emit(&self, entry_type: AuditEntryType, detail: String) -> Result<(), ApiError> {
        let entry = AuditLogEntry::new(
            &self.correlation_id,
            entry_type,
            self.acting_user_id,
            self.locus,
            self.summary,
            detail,
        );
        self.writer.write(&entry)
    }

    fn record_failure(&self, cause: &ApiError) {
        if let Err(sink_error) = self.emit(AuditEntryType::Failure, format!("EXCEPTION: {cause}")) {
            error!(
                correlation_id = %self.correlation_id,
                locus = self.locus,
                "unable to record audit failure ({sink_error}) for: {cause}"
            );
        }
    }
}
