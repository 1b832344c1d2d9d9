use anyhow::Result;
use chrono::{TimeZone, Utc};
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use caapi::data::enums::{AsymmetricKeyType, AuditEntryType, HashAlgorithm};
use caapi::data::error::ErrorKind;
use caapi::data::audit::Locus;
use crate::common::constants::*;
use crate::common::test_engine::{root_request, test_instant, TestEngine};

#[test]
fn test_create_root_certificate() -> Result<()> {
    let engine = TestEngine::new_with_peanuts()?;

    engine.switch_user(Some(LUCY));
    engine.create_root_certificate(&root_request(TEST_CA_ID))?;

    engine.switch_user(Some(LINUS));
    assert!(engine.certificate_exists(TEST_CA_ID)?);
    let stored = engine.fetch_certificate(TEST_CA_ID)?.expect("certificate was stored");

    let subject = "CN=Peanuts Root CA,C=US,ST=MN,L=Saint Paul,O=Peanuts\\, Inc.,OU=Certificate Services";
    assert_eq!(stored.certificate_id, TEST_CA_ID);
    assert_eq!(stored.serial_number, FIRST_SERIAL);
    assert_eq!(stored.subject, subject);
    assert_eq!(stored.issuer, subject);
    assert_eq!(stored.issuer_certificate_id, None);
    assert!(stored.is_active);
    assert_eq!(stored.common_name, "Peanuts Root CA");
    assert_eq!(stored.country_code.as_deref(), Some("US"));
    assert_eq!(stored.organizational_unit.as_deref(), Some("Certificate Services"));
    assert_eq!(stored.not_before, test_instant());
    assert_eq!(stored.not_after, Utc.with_ymd_and_hms(2034, 2, 28, 12, 0, 0).unwrap());

    let parsed = Pkcs12::from_der(&stored.pkcs12)?.parse2(TEST_PASSPHRASE)?;
    let certificate = parsed.cert.expect("bundle contains the certificate");
    let key = parsed.pkey.expect("bundle contains the private key");

    assert!(certificate.verify(&key)?);
    assert!(key.ec_key().is_ok());
    assert_eq!(certificate.serial_number().to_bn()?.to_dec_str()?.to_string(), FIRST_SERIAL.to_string());
    assert_eq!(certificate.issuer_name().to_der()?, certificate.subject_name().to_der()?);
    assert_eq!(stored.thumbprint, hex::encode_upper(&*certificate.digest(MessageDigest::sha1())?));

    let text = String::from_utf8(certificate.to_text()?)?;
    assert!(text.contains("CA:TRUE, pathlen:2"));

    assert!(Pkcs12::from_der(&stored.pkcs12)?.parse2("wrong passphrase").is_err());
    Ok(())
}

#[test]
fn test_rsa_root_certificate() -> Result<()> {
    let engine = TestEngine::new_initialized()?;

    let mut request = root_request("peanuts.rsa.ca");
    request.asymmetric_key_type = AsymmetricKeyType::Rsa2048;
    request.hash_algorithm = HashAlgorithm::Sha3_256;
    request.years_until_expire = 1;
    request.create_intermediate = true;
    engine.create_root_certificate(&request)?;

    let stored = engine.fetch_certificate("peanuts.rsa.ca")?.expect("certificate was stored");
    assert_eq!(stored.not_after, Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());

    let parsed = Pkcs12::from_der(&stored.pkcs12)?.parse2(TEST_PASSPHRASE)?;
    let key = parsed.pkey.expect("bundle contains the private key");
    assert_eq!(key.rsa()?.size() * 8, 2048);
    Ok(())
}

#[test]
fn test_duplicate_certificate_conflicts() -> Result<()> {
    let engine = TestEngine::new_initialized()?;
    engine.create_root_certificate(&root_request(TEST_CA_ID))?;
    let original = engine.fetch_certificate(TEST_CA_ID)?;

    let err = engine.create_root_certificate(&root_request(TEST_CA_ID)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainConflict);
    assert_eq!(err.to_string(), "Certificate peanuts.root.ca already exists");
    assert_eq!(engine.fetch_certificate(TEST_CA_ID)?, original);
    Ok(())
}

#[test]
fn test_weak_passphrase_is_refused() -> Result<()> {
    let engine = TestEngine::new_initialized()?;
    engine.audit.clear();

    for (passphrase, message) in [
        ("Sn0opy!", "passphrase must be at least 8 characters in length"),
        ("snoopy#woodstock1", "passphrase must have at least 1 upper-case characters"),
        ("Snoopy#Woodstock", "passphrase must have at least 1 numeric characters"),
        ("Snoopy1Woodstock", "passphrase must have at least 1 special characters"),
    ] {
        let mut request = root_request(TEST_CA_ID);
        request.asymmetric_private_key_passphrase = passphrase.to_string();
        let err = engine.create_root_certificate(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PassphrasePolicy);
        assert_eq!(err.to_string(), message);
    }

    assert!(engine.audit.is_empty());
    assert!(!engine.certificate_exists(TEST_CA_ID)?);
    Ok(())
}

#[test]
fn test_unsupported_algorithms_fail_before_any_work() -> Result<()> {
    let engine = TestEngine::new_initialized()?;

    let mut legacy_hash = root_request(TEST_CA_ID);
    legacy_hash.hash_algorithm = HashAlgorithm::Md5;
    let mut unknown_hash = root_request(TEST_CA_ID);
    unknown_hash.hash_algorithm = HashAlgorithm::Unrecognized(42);
    let mut unknown_key = root_request(TEST_CA_ID);
    unknown_key.asymmetric_key_type = AsymmetricKeyType::Unrecognized(9);

    for request in [legacy_hash, unknown_hash, unknown_key] {
        engine.audit.clear();
        let err = engine.create_root_certificate(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let types: Vec<_> = engine.audit.entries().iter().map(|e| e.entry_type).collect();
        assert_eq!(types, vec![AuditEntryType::Begin, AuditEntryType::Failure]);
    }
    assert!(!engine.certificate_exists(TEST_CA_ID)?);

    // no serial number was drawn for the refused requests
    engine.create_root_certificate(&root_request(TEST_CA_ID))?;
    assert_eq!(engine.fetch_certificate(TEST_CA_ID)?.map(|c| c.serial_number), Some(FIRST_SERIAL));
    Ok(())
}

#[test]
fn test_invalid_request_is_refused() -> Result<()> {
    let engine = TestEngine::new_initialized()?;

    let mut no_years = root_request(TEST_CA_ID);
    no_years.years_until_expire = 0;
    let mut no_path = root_request(TEST_CA_ID);
    no_path.path_length = 0;
    let mut bad_country = root_request(TEST_CA_ID);
    bad_country.subject_name_elements.country_code = Some("USA".to_string());
    let mut no_name = root_request(TEST_CA_ID);
    no_name.subject_name_elements.common_name = " ".to_string();
    let mut no_id = root_request(TEST_CA_ID);
    no_id.certificate_id = String::new();

    for request in [no_years, no_path, bad_country, no_name, no_id] {
        let err = engine.create_root_certificate(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(!engine.certificate_exists(TEST_CA_ID)?);
    Ok(())
}

#[test]
fn test_certificate_privileges_are_enforced() -> Result<()> {
    let engine = TestEngine::new_with_peanuts()?;

    for user_id in [LINUS, CHARLIE, SCHROEDER] {
        engine.switch_user(Some(user_id));
        let err = engine.create_root_certificate(&root_request(TEST_CA_ID)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    for user_id in [LUCY, SCHROEDER] {
        engine.switch_user(Some(user_id));
        let err = engine.fetch_certificate(TEST_CA_ID).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        let err = engine.certificate_exists(TEST_CA_ID).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    engine.switch_user(Some(LINUS));
    assert!(!engine.certificate_exists(TEST_CA_ID)?);
    assert_eq!(engine.fetch_certificate(TEST_CA_ID)?, None);
    assert!(!engine.audit.entries_for_locus(Locus::CERTIFICATE_FETCH).is_empty());
    Ok(())
}

#[test]
fn test_rsa_sha256_issuance_and_reissue() -> Result<()> {
    let engine = TestEngine::new_initialized()?;

    let mut request = root_request("my.rootcert");
    request.asymmetric_key_type = AsymmetricKeyType::Rsa2048;
    request.hash_algorithm = HashAlgorithm::Sha256;
    request.asymmetric_private_key_passphrase = "Pa$$word1".to_string();

    let mut weak = request.clone();
    weak.asymmetric_private_key_passphrase = "pa$$word".to_string();
    let err = engine.create_root_certificate(&weak).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PassphrasePolicy);
    assert!(!engine.certificate_exists("my.rootcert")?);

    engine.create_root_certificate(&request)?;
    assert!(engine.certificate_exists("my.rootcert")?);

    let err = engine.create_root_certificate(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainConflict);
    Ok(())
}

#[test]
fn test_every_key_and_hash_pairing() -> Result<()> {
    let engine = TestEngine::new_initialized()?;
    let key_types = [
        AsymmetricKeyType::Rsa2048,
        AsymmetricKeyType::Rsa4096,
        AsymmetricKeyType::NistP256,
        AsymmetricKeyType::NistP384,
        AsymmetricKeyType::NistP521,
    ];
    let hashes = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
    ];

    for key_type in key_types {
        for hash in hashes {
            let certificate_id = format!("peanuts.{key_type:?}.{hash:?}").to_lowercase();
            let mut request = root_request(&certificate_id);
            request.asymmetric_key_type = key_type;
            request.hash_algorithm = hash;

            let legacy = matches!(hash, HashAlgorithm::Md5 | HashAlgorithm::Sha1);
            let ecdsa_sha3 = !matches!(key_type, AsymmetricKeyType::Rsa2048 | AsymmetricKeyType::Rsa4096)
                && matches!(hash, HashAlgorithm::Sha3_256 | HashAlgorithm::Sha3_384 | HashAlgorithm::Sha3_512);

            let result = engine.create_root_certificate(&request);
            if legacy || ecdsa_sha3 {
                let err = result.expect_err(&certificate_id);
                assert_eq!(err.kind(), ErrorKind::Unsupported, "{certificate_id}: {err}");
                assert!(!engine.certificate_exists(&certificate_id)?, "{certificate_id}");
            } else {
                result.map_err(|e| anyhow::anyhow!("{certificate_id}: {e}"))?;
                let stored = engine.fetch_certificate(&certificate_id)?.expect("certificate was stored");
                let parsed = Pkcs12::from_der(&stored.pkcs12)?.parse2(TEST_PASSPHRASE)?;
                let certificate = parsed.cert.expect("bundle contains the certificate");
                assert!(certificate.verify(&parsed.pkey.expect("bundle contains the private key"))?, "{certificate_id}");
            }
        }
    }
    Ok(())
}
