use std::sync::Arc;
use tracing::info;
use crate::audit::{AuditLogWriter, AuditTrail, FanOutAuditLogWriter, StoreAuditLogWriter, TracingAuditLogWriter};
use crate::auth::identity::IdentitySource;
use crate::db::{CaApiDB, DataStore};
use crate::settings::Settings;
use crate::sources::{OpenSslRandomSource, SystemTimeSource};

pub mod audit;
pub mod auth;
pub mod cert;
pub mod constants;
pub mod data;
pub mod db;
pub mod dialect;
pub mod engine;
pub mod helper;
pub mod logging;
pub mod settings;
pub mod sources;
pub mod transaction;

pub use crate::engine::ApplicationEngine;

pub type ApiError = data::error::ApiError;

/// Wire up an engine from settings: logging, the configured store, an audit
/// trail that goes to both tracing and the store, system clock and OpenSSL
/// randomness. The store is initialized before the engine is returned.
pub fn create_engine(settings: &Settings, identity: Arc<dyn IdentitySource>) -> Result<ApplicationEngine, ApiError> {
    settings.validate()?;
    logging::init_logging(&settings.logging);

    info!("Opening data store {:?}", settings.data_store.backend);
    let store: Arc<dyn DataStore> = Arc::new(CaApiDB::from_settings(&settings.data_store));

    let writers: Vec<Arc<dyn AuditLogWriter>> = vec![
        Arc::new(TracingAuditLogWriter),
        Arc::new(StoreAuditLogWriter::new(store.clone())),
    ];
    let audit = AuditTrail::new(Arc::new(FanOutAuditLogWriter::new(writers)));

    let engine = ApplicationEngine::new(
        settings.engine.clone(),
        store,
        identity,
        audit,
        Arc::new(SystemTimeSource),
        Arc::new(OpenSslRandomSource),
    );
    engine.initialize()?;
    Ok(engine)
}
