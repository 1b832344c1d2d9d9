use std::sync::Arc;
use anyhow::Result;
use caapi::auth::identity::SettableIdentitySource;
use caapi::constants::BOOTSTRAP_ADMIN_USER_ID;
use caapi::create_engine;
use caapi::data::error::ErrorKind;
use caapi::data::objects::User;
use caapi::db::{CaApiDB, DataStore};
use caapi::settings::{DataStoreBackend, LogLevel, Settings};
use crate::common::constants::*;
use crate::common::test_engine::{root_request, TestEngine};

fn admin_identity() -> Arc<SettableIdentitySource> {
    Arc::new(SettableIdentitySource::new(Some(BOOTSTRAP_ADMIN_USER_ID)))
}

#[test]
fn test_file_backed_store_survives_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut settings = Settings::default();
    settings.data_store.backend = DataStoreBackend::File { path: dir.path().join("caapi.db3") };

    {
        let engine = create_engine(&settings, admin_identity())?;
        engine.create_user(&User::new(CHARLIE, "Charlie Brown", true))?;
        engine.create_root_certificate(&root_request(TEST_CA_ID))?;
    }

    let engine = create_engine(&settings, admin_identity())?;
    assert_eq!(engine.fetch_user(CHARLIE)?, Some(User::new(CHARLIE, "Charlie Brown", true)));
    assert!(engine.certificate_exists(TEST_CA_ID)?);
    assert_eq!(engine.fetch_all_user_roles()?.len(), 1);
    Ok(())
}

#[test]
fn test_settings_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");

    let mut settings = Settings::default();
    settings.logging.level = LogLevel::Debug;
    settings.engine.passphrase_mandates.min_length = 12;
    settings.engine.passphrase_mandates.min_special = 2;
    settings.data_store.backend = DataStoreBackend::File { path: dir.path().join("caapi.db3") };
    settings.save_to_file(&path)?;

    assert_eq!(Settings::load_from_file(Some(&path))?, settings);
    assert_eq!(Settings::load_from_file(Some(&dir.path().join("missing.json")))?, Settings::default());
    Ok(())
}

#[test]
fn test_configured_mandates_apply() -> Result<()> {
    let mut settings = Settings::default();
    settings.engine.passphrase_mandates.min_length = 24;
    let engine = create_engine(&settings, admin_identity())?;

    let err = engine.create_root_certificate(&root_request(TEST_CA_ID)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PassphrasePolicy);
    assert_eq!(err.to_string(), "passphrase must be at least 24 characters in length");
    Ok(())
}

#[test]
fn test_invalid_settings_are_refused() {
    let mut settings = Settings::default();
    settings.engine.passphrase_mandates.min_length = 0;

    let err = create_engine(&settings, admin_identity()).err().expect("settings are invalid");
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn test_zap_then_initialize_restores_bootstrap() -> Result<()> {
    let engine = TestEngine::new_with_peanuts()?;
    engine.store.zap()?;

    engine.initialize()?;
    assert!(!engine.exists_user(CHARLIE)?);
    assert!(engine.exists_user(BOOTSTRAP_ADMIN_USER_ID)?);
    Ok(())
}

#[test]
fn test_no_transaction_left_open() -> Result<()> {
    let engine = TestEngine::new_with_peanuts()?;

    assert!(engine.delete_role(ADMIN_ROLE).is_err());
    assert!(engine.add_user_ids_to_role(READER_ROLE, &[SCHROEDER, "snoopy"]).is_err());
    engine.add_user_ids_to_role(READER_ROLE, &[SCHROEDER])?;

    assert_eq!(engine.store.transaction_depth(), 0);
    assert!(!engine.store.in_transaction());
    Ok(())
}

#[test]
fn test_two_memory_stores_are_independent() -> Result<()> {
    let first = TestEngine::new_with_peanuts()?;
    let second = TestEngine::with_store(Arc::new(CaApiDB::in_memory()));
    second.initialize()?;

    assert!(first.exists_user(CHARLIE)?);
    assert!(!second.exists_user(CHARLIE)?);
    Ok(())
}

#[test]
fn test_bool_transaction_commits_only_on_true() -> Result<()> {
    let store = CaApiDB::in_memory();
    store.initialize()?;

    let kept = store.transaction_wrap_bool(&mut || {
        store.insert_user(&User::new("snoopy", "Snoopy", true))?;
        Ok(false)
    })?;
    assert!(!kept);
    assert!(!store.exists_user("snoopy")?);
    assert!(!store.in_transaction());

    let kept = store.transaction_wrap_bool(&mut || {
        store.insert_user(&User::new("snoopy", "Snoopy", true))?;
        Ok(true)
    })?;
    assert!(kept);
    assert_eq!(store.fetch_user("snoopy")?, Some(User::new("snoopy", "Snoopy", true)));

    let err = store.transaction_wrap_bool(&mut || {
        store.insert_user(&User::new("woodstock", "Woodstock", true))?;
        Err(caapi::ApiError::Validation("FriendlyName may not be null/empty/blank".into()))
    }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!store.exists_user("woodstock")?);
    Ok(())
}
