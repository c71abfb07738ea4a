use std::io::Write;

use riskcheck_catalog::{AppConfig, CatalogError, QuestionCatalog};
use riskcheck_core::CheckType;

// ---------------------------------------------------------------------------
// Configuration files
// ---------------------------------------------------------------------------

#[test]
fn test_partial_config_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("riskcheck.yml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "database:\n  path: assessments.db").unwrap();
    f.flush().unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.database.path.to_str(), Some("assessments.db"));
    assert_eq!(config.scan.probe_timeout_secs, 30);
    assert_eq!(config.scan.global_timeout_secs, 60);
    assert_eq!(config.scan.checks, CheckType::ALL.to_vec());
    assert!(config.probes.is_empty());
    config.validate().unwrap();
}

#[test]
fn test_malformed_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("riskcheck.yml");
    std::fs::write(&path, "scan: [this is not a mapping").unwrap();

    assert!(matches!(
        AppConfig::load(&path),
        Err(CatalogError::YamlError(_))
    ));
}

#[test]
fn test_missing_config_file_is_io_error_for_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yml");
    assert!(matches!(AppConfig::load(&path), Err(CatalogError::IoError(_))));
    assert!(AppConfig::load_or_default(&path).is_ok());
}

#[test]
fn test_overrides_sorted_by_check() {
    let yaml = r#"
probes:
  network:
    program: sh
  antivirus:
    program: sh
    args: ["-c", "true"]
"#;
    let config = AppConfig::from_yaml_str(yaml).unwrap();
    let checks: Vec<_> = config
        .probe_overrides()
        .unwrap()
        .into_iter()
        .map(|(check, _)| check)
        .collect();
    assert_eq!(checks, vec![CheckType::Antivirus, CheckType::Network]);
}

// ---------------------------------------------------------------------------
// Question catalog files
// ---------------------------------------------------------------------------

#[test]
fn test_catalog_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questions.yaml");
    std::fs::write(
        &path,
        r#"
categories:
  - category: Devices
    questions:
      - subcategory: Screen lock
        question: Do all laptops lock automatically?
        action: Enable a five minute screen lock.
  - category: Email
    questions:
      - question: Is phishing training given yearly?
"#,
    )
    .unwrap();

    let catalog = QuestionCatalog::load(&path).unwrap();
    assert_eq!(catalog.len(), 2);
    let rows = catalog.to_new_questions();
    assert_eq!(rows[0].category, "Devices");
    assert_eq!(rows[0].subcategory.as_deref(), Some("Screen lock"));
    assert_eq!(rows[1].category, "Email");
    assert_eq!(rows[1].action, None);
}

#[test]
fn test_catalog_without_categories_rejected() {
    let err = QuestionCatalog::from_yaml_str("categories: []").unwrap_err();
    assert!(matches!(err, CatalogError::InvalidCatalog(_)));
}
